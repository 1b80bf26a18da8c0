//! # 主机环：客户端对集群节点的本地视图
//!
//! ## 核心意图（Why）
//! - 生命周期处理器只需要“按地址增删查节点、更新元数据、切换可用状态”这几个原语；
//!   [`HostRing`] 把这些原语抽象为接缝，环内部的数据结构与一致性 token 映射不在本 crate 职责内。
//! - [`InMemoryRing`] 提供基于 `DashMap` 的默认实现，满足并发读写场景，也作为测试的真实协作者。
//!
//! ## 行为契约（What）
//! - 节点以地址字符串（`IpAddr` 的 `Display` 形式）为键；
//! - `add_host_if_missing` 为原子操作：已存在时返回既有实例与 `false`；
//! - `remove_host` 幂等，移除不存在的地址不是错误。
//!
//! ## 风险提示（Trade-offs）
//! - `Host` 以 `Arc` 共享，环移除后仍被连接池持有的实例不会失效，只是不再被环索引。

use std::{
    net::IpAddr,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::RwLock;

/// 节点可用状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeState {
    Up = 0,
    Down = 1,
}

impl NodeState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Up,
            _ => Self::Down,
        }
    }
}

/// 通过控制连接拉取到的节点元数据。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostInfo {
    pub address: Option<IpAddr>,
    pub port: u16,
    pub host_id: Option<String>,
    pub data_center: Option<String>,
    pub rack: Option<String>,
    pub release_version: Option<String>,
    pub tokens: Vec<String>,
}

impl HostInfo {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self {
            address: Some(address),
            port,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_data_center(mut self, data_center: impl Into<String>) -> Self {
        self.data_center = Some(data_center.into());
        self
    }

    #[must_use]
    pub fn with_rack(mut self, rack: impl Into<String>) -> Self {
        self.rack = Some(rack.into());
        self
    }

    #[must_use]
    pub fn with_host_id(mut self, host_id: impl Into<String>) -> Self {
        self.host_id = Some(host_id.into());
        self
    }

    /// 环中的索引键；缺少地址时为空串。
    pub fn ring_key(&self) -> String {
        self.address.map(|ip| ip.to_string()).unwrap_or_default()
    }
}

/// 环中的一个节点。
///
/// # 教案式注释
/// - **意图 (Why)**：同一个 `Host` 会被环与连接池同时持有，状态切换与元数据更新必须在
///   `&self` 上完成；
/// - **契约 (What)**：
///   - `address` 在构造时确定，[`Host::update`] 不会改变它；
///   - 新建节点默认处于 [`NodeState::Up`]；
/// - **实现 (How)**：元数据位于 `parking_lot::RwLock`，状态使用 `AtomicU8`，读多写少场景下开销很低。
#[derive(Debug)]
pub struct Host {
    address: Arc<str>,
    info: RwLock<HostInfo>,
    state: AtomicU8,
}

impl Host {
    pub fn new(info: HostInfo) -> Self {
        Self {
            address: Arc::from(info.ring_key()),
            info: RwLock::new(info),
            state: AtomicU8::new(NodeState::Up as u8),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.info.read().port
    }

    /// 返回当前元数据的副本。
    pub fn info(&self) -> HostInfo {
        self.info.read().clone()
    }

    /// 用新拉取的元数据覆盖当前元数据，保留原有地址。
    pub fn update(&self, info: HostInfo) {
        let mut guard = self.info.write();
        let address = guard.address;
        *guard = HostInfo { address, ..info };
    }

    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: NodeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_up(&self) -> bool {
        self.state() == NodeState::Up
    }
}

/// 主机环的接缝。
///
/// 实现者需自带内部同步：生命周期处理器会从多个任务并发调用。
pub trait HostRing: Send + Sync {
    /// 若地址未登记则插入新节点。
    ///
    /// 返回 `(节点, 是否新插入)`；已存在时返回环中既有的实例。
    fn add_host_if_missing(&self, info: HostInfo) -> (Arc<Host>, bool);

    /// 按地址移除节点，返回被移除的实例。
    fn remove_host(&self, address: &str) -> Option<Arc<Host>>;

    fn get_host(&self, address: &str) -> Option<Arc<Host>>;
}

/// 基于 `DashMap` 的内存主机环。
#[derive(Debug, Default)]
pub struct InMemoryRing {
    hosts: DashMap<Arc<str>, Arc<Host>>,
}

impl InMemoryRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// 当前所有节点的快照，顺序不作保证。
    pub fn hosts(&self) -> Vec<Arc<Host>> {
        self.hosts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl HostRing for InMemoryRing {
    fn add_host_if_missing(&self, info: HostInfo) -> (Arc<Host>, bool) {
        let key: Arc<str> = Arc::from(info.ring_key());
        match self.hosts.entry(key) {
            Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
            Entry::Vacant(vacant) => {
                let host = Arc::new(Host::new(info));
                vacant.insert(Arc::clone(&host));
                (host, true)
            }
        }
    }

    fn remove_host(&self, address: &str) -> Option<Arc<Host>> {
        self.hosts.remove(address).map(|(_, host)| host)
    }

    fn get_host(&self, address: &str) -> Option<Arc<Host>> {
        self.hosts.get(address).map(|entry| Arc::clone(entry.value()))
    }
}
