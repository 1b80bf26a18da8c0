//! 连接池接缝。
//!
//! # 教案级说明
//! - **Why**：连接池内部的负载均衡与连接生命周期不属于本 crate；生命周期处理器只需通知它
//!   “有新节点 / 节点移除 / 节点上线 / 节点下线”。
//! - **What**：四个方法都应是非阻塞的通知，耗时操作（建连、关闭）由连接池自行异步化；
//!   实现者需自带内部同步。
//! - **Trade-offs**：`host_down` 与 `remove_host` 以地址而非 `Host` 为参数，因为连接池可能仍持有
//!   一个环已经遗忘的节点的连接。

use std::sync::Arc;

use crate::ring::Host;

pub trait ConnectionPool: Send + Sync {
    /// 为节点建立（或准备建立）连接。
    fn add_host(&self, host: Arc<Host>);

    /// 关闭并移除该地址的全部连接；地址未知时为空操作。
    fn remove_host(&self, address: &str);

    fn host_up(&self, host: Arc<Host>);

    fn host_down(&self, address: &str);
}
