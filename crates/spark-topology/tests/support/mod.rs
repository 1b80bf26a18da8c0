//! 集成测试共享的记录型协作者。
//!
//! 所有协作者把调用写入同一条 [`CallLog`]，测试据此断言跨环、连接池与控制连接的调用顺序。

#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use spark_topology::{
    ConnectionPool, ControlConnection, Host, HostInfo, HostRing, HostSource, InMemoryRing,
    NodeLifecycle, TopologyError,
};

/// 协作者上发生的一次调用。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Fetch(IpAddr, u16),
    RingAdd(String),
    RingRemove(String),
    PoolAdd(String),
    PoolRemove(String),
    PoolUp(String),
    PoolDown(String),
    Refresh,
}

/// 线程安全的调用记录。
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn push(&self, call: Call) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }
}

pub fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
}

/// 记录调用的主机环，内部委托给 [`InMemoryRing`]。
pub struct RecordingRing {
    inner: InMemoryRing,
    log: CallLog,
}

impl RecordingRing {
    pub fn new(log: CallLog) -> Self {
        Self {
            inner: InMemoryRing::new(),
            log,
        }
    }

    pub fn inner(&self) -> &InMemoryRing {
        &self.inner
    }
}

impl HostRing for RecordingRing {
    fn add_host_if_missing(&self, info: HostInfo) -> (Arc<Host>, bool) {
        self.log.push(Call::RingAdd(info.ring_key()));
        self.inner.add_host_if_missing(info)
    }

    fn remove_host(&self, address: &str) -> Option<Arc<Host>> {
        self.log.push(Call::RingRemove(address.to_owned()));
        self.inner.remove_host(address)
    }

    fn get_host(&self, address: &str) -> Option<Arc<Host>> {
        self.inner.get_host(address)
    }
}

pub struct RecordingPool {
    log: CallLog,
}

impl ConnectionPool for RecordingPool {
    fn add_host(&self, host: Arc<Host>) {
        self.log.push(Call::PoolAdd(host.address().to_owned()));
    }

    fn remove_host(&self, address: &str) {
        self.log.push(Call::PoolRemove(address.to_owned()));
    }

    fn host_up(&self, host: Arc<Host>) {
        self.log.push(Call::PoolUp(host.address().to_owned()));
    }

    fn host_down(&self, address: &str) {
        self.log.push(Call::PoolDown(address.to_owned()));
    }
}

pub struct RecordingHostSource {
    log: CallLog,
}

impl HostSource for RecordingHostSource {
    fn refresh_ring(&self) {
        self.log.push(Call::Refresh);
    }
}

/// 按地址返回预置元数据的控制连接；未预置的地址返回拉取失败。
pub struct StubControl {
    log: CallLog,
    hosts: Mutex<HashMap<IpAddr, HostInfo>>,
}

impl StubControl {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    pub fn serve(&self, info: HostInfo) {
        if let Some(address) = info.address {
            self.serve_as(address, info);
        }
    }

    /// 为 `ip` 预置元数据；`info` 本身可以不带地址。
    pub fn serve_as(&self, ip: IpAddr, info: HostInfo) {
        self.hosts.lock().insert(ip, info);
    }
}

#[async_trait]
impl ControlConnection for StubControl {
    async fn fetch_host_info(&self, ip: IpAddr, port: u16) -> Result<HostInfo, TopologyError> {
        self.log.push(Call::Fetch(ip, port));
        self.hosts
            .lock()
            .get(&ip)
            .cloned()
            .ok_or_else(|| TopologyError::fetch_host_info(ip, port, "host not served"))
    }
}

/// 装配好的测试夹具。
pub struct Fixture {
    pub log: CallLog,
    pub ring: Arc<RecordingRing>,
    pub control: Arc<StubControl>,
    pub lifecycle: Arc<NodeLifecycle>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_builder(|builder| builder)
    }

    /// 允许测试在构造前追加过滤器等可选协作者；控制连接总是会被配置。
    pub fn with_builder(
        customize: impl FnOnce(
            spark_topology::lifecycle::NodeLifecycleBuilder,
        ) -> spark_topology::lifecycle::NodeLifecycleBuilder,
    ) -> Self {
        let log = CallLog::default();
        let ring = Arc::new(RecordingRing::new(log.clone()));
        let control = Arc::new(StubControl::new(log.clone()));
        let builder = NodeLifecycle::builder(
            ring.clone(),
            Arc::new(RecordingPool { log: log.clone() }),
            Arc::new(RecordingHostSource { log: log.clone() }),
        )
        .control(control.clone());
        let lifecycle = Arc::new(customize(builder).build());
        Self {
            log,
            ring,
            control,
            lifecycle,
        }
    }

    /// 构造不带控制连接的生命周期处理器。
    pub fn without_control() -> (CallLog, Arc<RecordingRing>, NodeLifecycle) {
        let log = CallLog::default();
        let ring = Arc::new(RecordingRing::new(log.clone()));
        let lifecycle = NodeLifecycle::builder(
            ring.clone(),
            Arc::new(RecordingPool { log: log.clone() }),
            Arc::new(RecordingHostSource { log: log.clone() }),
        )
        .build();
        (log, ring, lifecycle)
    }
}
