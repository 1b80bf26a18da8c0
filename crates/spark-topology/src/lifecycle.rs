//! # 节点生命周期处理器
//!
//! ## 核心意图（Why）
//! - 聚合器为每个节点给出一次最终的状态跃迁，本模块负责把它落实到主机环与连接池上。
//!
//! ## 行为契约（What）
//! - **新节点**：无控制连接时为空操作；拉取元数据失败则记录日志并放弃；通过过滤后插入环
//!   （已存在则原地更新并沿用既有实例），登记到连接池，最后触发一次全量环刷新；
//! - **移除节点**：无条件从连接池与环中移除该地址，随后触发环刷新；
//! - **节点上线**：环中已知则标记 `Up` 并通知连接池；未知则按新节点处理；
//! - **节点下线**：环中已知则标记 `Down`；无论是否已知，都通知连接池该地址下线。
//!
//! ## 风险提示（Trade-offs）
//! - 不重试、不回滚：环与连接池之间没有事务，失败时保留已完成的部分动作，依赖周期性全量刷新收敛。

use std::{net::IpAddr, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    discovery::{ControlConnection, HostFilter, HostSource},
    pool::ConnectionPool,
    ring::{HostRing, NodeState},
};

/// 将单个节点的状态跃迁应用到环与连接池。
pub struct NodeLifecycle {
    ring: Arc<dyn HostRing>,
    pool: Arc<dyn ConnectionPool>,
    host_source: Arc<dyn HostSource>,
    control: Option<Arc<dyn ControlConnection>>,
    filter: Option<Arc<dyn HostFilter>>,
}

impl NodeLifecycle {
    /// 以必需的协作者开始构造。
    pub fn builder(
        ring: Arc<dyn HostRing>,
        pool: Arc<dyn ConnectionPool>,
        host_source: Arc<dyn HostSource>,
    ) -> NodeLifecycleBuilder {
        NodeLifecycleBuilder {
            ring,
            pool,
            host_source,
            control: None,
            filter: None,
        }
    }

    pub fn ring(&self) -> &Arc<dyn HostRing> {
        &self.ring
    }

    /// 处理新加入的节点。
    ///
    /// # 教案式说明
    /// - **逻辑 (How)**：
    ///   1. 未配置控制连接时直接返回；
    ///   2. 拉取 `(ip, port)` 的元数据，失败则记录 `warn` 并放弃，不做部分插入；
    ///      元数据缺少地址时补上事件中的 `ip`；
    ///   3. 过滤器拒绝时放弃；
    ///   4. 插入环；已存在则用新元数据原地更新，并继续使用环中的既有实例；
    ///   5. 登记到连接池并触发环刷新。
    pub async fn handle_new_node(&self, ip: IpAddr, port: u16) {
        let Some(control) = &self.control else {
            debug!(host = %ip, port, "no control connection, ignoring new node");
            return;
        };

        let mut host_info = match control.fetch_host_info(ip, port).await {
            Ok(host_info) => host_info,
            Err(err) => {
                warn!(host = %ip, port, code = err.code(), error = %err, "unable to fetch host info");
                return;
            }
        };

        // 元数据缺少地址时以事件地址为环索引，否则后续 UP/DOWN 无法找回该节点。
        host_info.address.get_or_insert(ip);

        if let Some(filter) = &self.filter
            && !filter.accept(&host_info)
        {
            debug!(host = %ip, port, "host rejected by filter");
            return;
        }

        let (host, added) = self.ring.add_host_if_missing(host_info.clone());
        if !added {
            info!(host = %ip, port, "already have host, updating");
            host.update(host_info);
        }

        self.pool.add_host(host);
        self.host_source.refresh_ring();
    }

    /// 处理被移除的节点。移除不经过过滤器。
    pub async fn handle_removed_node(&self, ip: IpAddr, _port: u16) {
        let address = ip.to_string();
        self.pool.remove_host(&address);
        if self.ring.remove_host(&address).is_none() {
            debug!(host = %address, "removed node was not in the ring");
        }
        self.host_source.refresh_ring();
    }

    /// 处理上线通知；未知节点按新节点处理。
    pub async fn handle_node_up(&self, ip: IpAddr, port: u16) {
        let address = ip.to_string();
        if let Some(host) = self.ring.get_host(&address) {
            host.set_state(NodeState::Up);
            self.pool.host_up(host);
            return;
        }

        debug!(host = %address, port, "unknown host reported up, treating as new node");
        self.handle_new_node(ip, port).await;
    }

    /// 处理下线通知。连接池可能仍持有环已遗忘的节点，因此总是通知连接池。
    pub async fn handle_node_down(&self, ip: IpAddr, _port: u16) {
        let address = ip.to_string();
        if let Some(host) = self.ring.get_host(&address) {
            host.set_state(NodeState::Down);
        }
        self.pool.host_down(&address);
    }
}

/// [`NodeLifecycle`] 的构造器。
pub struct NodeLifecycleBuilder {
    ring: Arc<dyn HostRing>,
    pool: Arc<dyn ConnectionPool>,
    host_source: Arc<dyn HostSource>,
    control: Option<Arc<dyn ControlConnection>>,
    filter: Option<Arc<dyn HostFilter>>,
}

impl NodeLifecycleBuilder {
    #[must_use]
    pub fn control(mut self, control: Arc<dyn ControlConnection>) -> Self {
        self.control = Some(control);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Arc<dyn HostFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn build(self) -> NodeLifecycle {
        NodeLifecycle {
            ring: self.ring,
            pool: self.pool,
            host_source: self.host_source,
            control: self.control,
            filter: self.filter,
        }
    }
}
