//! 节点发现相关的外部协作者。
//!
//! # 教案级说明
//! - **Why**：新节点处理需要三类外部能力：通过控制连接拉取单个节点的完整元数据、触发一次全量环
//!   刷新、以及（可选）按宿主策略过滤发现到的节点。它们都在网络或宿主侧实现，这里只定义接缝。
//! - **What**：
//!   - [`ControlConnection::fetch_host_info`] 可能失败，调用方记录日志后放弃本次事件，不重试；
//!   - [`HostSource::refresh_ring`] 为“发出即忘”，不得阻塞调用方；
//!   - [`HostFilter`] 只约束“加入”，从不约束“移除”。

use std::net::IpAddr;

use async_trait::async_trait;

use crate::{error::TopologyError, ring::HostInfo};

/// 用于拉取权威节点元数据的专用连接。
#[async_trait]
pub trait ControlConnection: Send + Sync {
    async fn fetch_host_info(&self, ip: IpAddr, port: u16) -> Result<HostInfo, TopologyError>;
}

/// 全量环刷新的触发器。
pub trait HostSource: Send + Sync {
    fn refresh_ring(&self);
}

/// 决定一个新发现的节点是否允许加入环与连接池。
pub trait HostFilter: Send + Sync {
    fn accept(&self, host: &HostInfo) -> bool;
}

/// 仅接受指定数据中心节点的过滤器。
#[derive(Clone, Debug)]
pub struct DataCenterFilter {
    data_center: String,
}

impl DataCenterFilter {
    pub fn new(data_center: impl Into<String>) -> Self {
        Self {
            data_center: data_center.into(),
        }
    }
}

impl HostFilter for DataCenterFilter {
    fn accept(&self, host: &HostInfo) -> bool {
        host.data_center.as_deref() == Some(self.data_center.as_str())
    }
}
