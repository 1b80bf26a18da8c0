//! # 节点事件聚合器
//!
//! ## 核心意图（Why）
//! - 一个去抖窗口内，同一节点可能先后上报 `DOWN`、`UP`、`NEW_NODE` 等多条通知；逐条应用既浪费
//!   又可能在中间状态上触发多余的元数据拉取。聚合器把一个批次压缩为“每个节点一次最终跃迁”。
//!
//! ## 行为契约（What）
//! - 按批次顺序（即到达顺序）遍历，以地址字符串为键，后到者覆盖变更类型（last-write-wins），
//!   节点的 IP 与端口取自该节点的第一条通知；
//! - 每个节点恰好分派一次生命周期调用；`MOVED_NODE` 只记录日志不处理；
//! - 不同节点之间的分派顺序不作保证，调用方与测试都不得依赖。

use std::{collections::HashMap, net::IpAddr, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    debounce::BatchHandler,
    event::{ChangeKind, Notification},
    lifecycle::NodeLifecycle,
};

/// 单个节点在一个批次内的最终状态跃迁。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedNodeEvent {
    pub host: IpAddr,
    pub port: u16,
    pub change: ChangeKind,
}

/// 将一个批次解析为“地址 → 最终跃迁”的映射。
///
/// 非节点类通知（Schema 变更等）被跳过。
pub fn resolve_node_events(batch: &[Notification]) -> HashMap<String, ResolvedNodeEvent> {
    let mut events: HashMap<String, ResolvedNodeEvent> = HashMap::new();
    for change in batch.iter().filter_map(Notification::node_change) {
        events
            .entry(change.address())
            .and_modify(|event| event.change = change.change)
            .or_insert_with(|| ResolvedNodeEvent {
                host: change.host,
                port: change.port,
                change: change.change,
            });
    }
    events
}

/// 去抖器 `NodeEvents` 的批量回调：解析批次并分派到生命周期处理器。
#[derive(Clone)]
pub struct NodeEventAggregator {
    lifecycle: Arc<NodeLifecycle>,
}

impl NodeEventAggregator {
    pub fn new(lifecycle: Arc<NodeLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// 解析并依次处理一个批次。
    pub async fn handle_batch(&self, batch: &[Notification]) {
        for (address, event) in resolve_node_events(batch) {
            debug!(host = %address, change = %event.change, "handling debounced node event");
            self.dispatch(event).await;
        }
    }

    async fn dispatch(&self, event: ResolvedNodeEvent) {
        let ResolvedNodeEvent { host, port, change } = event;
        match change {
            ChangeKind::NewNode => self.lifecycle.handle_new_node(host, port).await,
            ChangeKind::RemovedNode => self.lifecycle.handle_removed_node(host, port).await,
            // 仅记录：token 映射的刷新由全量环刷新负责。
            ChangeKind::MovedNode => info!(host = %host, port, "ignoring MOVED_NODE event"),
            ChangeKind::Up => self.lifecycle.handle_node_up(host, port).await,
            ChangeKind::Down => self.lifecycle.handle_node_down(host, port).await,
        }
    }
}

#[async_trait]
impl BatchHandler<Notification> for NodeEventAggregator {
    async fn on_batch(&self, batch: Vec<Notification>) {
        self.handle_batch(&batch).await;
    }
}
