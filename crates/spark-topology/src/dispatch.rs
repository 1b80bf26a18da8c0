//! # 事件分发入口
//!
//! ## 核心意图（Why）
//! - 每条连接的读循环都会把解码后的事件交给这里；入口必须“立即返回”，既不等待聚合也不等待
//!   生命周期处理，否则一个慢的元数据拉取会拖住网络读循环。
//!
//! ## 行为契约（What）
//! - 拓扑变更与状态变更进入 `NodeEvents` 去抖器；
//! - Schema 变更被识别但有意不处理；
//! - 无法识别的事件类型记录为非法事件并丢弃；
//! - 解码失败记录 `warn` 后丢弃该帧，不重试。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    aggregate::NodeEventAggregator,
    config::DebounceConfig,
    debounce::{Debouncer, DebouncerSnapshot},
    error::TopologyError,
    event::{EventDecoder, Notification},
    lifecycle::NodeLifecycle,
};

/// 节点事件去抖器的名称，出现在日志字段 `debouncer` 中。
pub const NODE_EVENTS: &str = "NodeEvents";

/// 把单条事件通知路由到去抖器的入口。
///
/// # 教案式注释
/// - **意图 (Why)**：集中管理“通知 → 去抖 → 聚合 → 生命周期”的装配，宿主只需持有一个对象；
/// - **契约 (What)**：
///   - [`EventDispatcher::new`] 必须在 Tokio 运行时内调用；
///   - [`EventDispatcher::stop`] 停止去抖器后，后续通知仍会被接收但不再被刷新。
#[derive(Debug)]
pub struct EventDispatcher {
    node_events: Debouncer<Notification>,
}

impl EventDispatcher {
    /// 使用给定配置创建 `NodeEvents` 去抖器，并以聚合器作为其批量回调。
    pub fn new(
        config: DebounceConfig,
        lifecycle: Arc<NodeLifecycle>,
    ) -> Result<Self, TopologyError> {
        let aggregator = NodeEventAggregator::new(lifecycle);
        let node_events = Debouncer::try_new(NODE_EVENTS, config, aggregator)?;
        Ok(Self { node_events })
    }

    /// 路由一条已解码的通知。
    pub fn handle_event(&self, notification: Notification) {
        debug!(event = ?notification, "received event");
        match notification {
            Notification::TopologyChange(_) | Notification::StatusChange(_) => {
                self.node_events.debounce(notification);
            }
            Notification::SchemaChange(change) => {
                debug!(
                    keyspace = %change.keyspace,
                    target = ?change.target,
                    "ignoring schema change event"
                );
            }
            Notification::Unrecognized { event_type } => {
                warn!(event_type = %event_type, "invalid event frame, discarding");
            }
        }
    }

    /// 解码一帧原始事件并路由；解码失败时记录并丢弃。
    pub fn handle_frame<D>(&self, decoder: &D, frame: &[u8])
    where
        D: EventDecoder + ?Sized,
    {
        match decoder.decode(frame) {
            Ok(notification) => self.handle_event(notification),
            Err(err) => {
                warn!(code = err.code(), error = %err, "unable to parse event frame");
            }
        }
    }

    pub fn node_events(&self) -> &Debouncer<Notification> {
        &self.node_events
    }

    pub fn stats(&self) -> DebouncerSnapshot {
        self.node_events.stats()
    }

    /// 停止 `NodeEvents` 去抖器，幂等。
    pub async fn stop(&self) {
        self.node_events.stop().await;
    }
}
