#![doc = r#"
# spark-topology

## 设计动机（Why）
- **定位**：存储集群客户端会从每条连接收到拓扑变更（节点加入/离开）与状态变更（节点上线/下线）
  通知；这些通知在滚动重启时成批、重复、甚至相互矛盾。该 crate 把嘈杂的通知流转换为
  限速、可靠的动作，作用于本地主机环与连接池。
- **架构角色**：位于帧解码器之后、主机环与连接池之前；解码、环的内部结构、连接池的连接管理、
  节点元数据的网络拉取都属于外部协作者，这里只定义它们的接缝。

## 核心契约（What）
- [`debounce::Debouncer`]：通用去抖引擎，将一个突发合并为批量回调，容量有界、溢出丢弃；
- [`aggregate::NodeEventAggregator`]：按地址归并批次，后到者覆盖（last-write-wins），
  每个节点只分派一次生命周期调用；
- [`lifecycle::NodeLifecycle`]：新增 / 移除 / 上线 / 下线四个处理器；
- [`dispatch::EventDispatcher`]：单条通知的路由入口，立即返回。

## 实现策略（How）
- 数据流：通知 → `EventDispatcher` → `Debouncer::debounce` →（安静期结束）→ 聚合器 →
  生命周期处理器 → 环 / 连接池 / 控制连接；
- 后台刷新循环运行在 Tokio 上，回调在独立任务中执行，刷新循环与生产者都不会被回调阻塞。

## 风险与考量（Trade-offs）
- 尽力而为、至多一次：不保证每条原始通知都被处理，失败不重试，依赖外部周期性全量环刷新收敛；
- 跨批次没有顺序保证，同一批次内不同节点之间也没有分派顺序保证。
"#]

pub mod aggregate;
pub mod config;
pub mod debounce;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod pool;
pub mod ring;
pub mod telemetry;

pub use aggregate::{NodeEventAggregator, ResolvedNodeEvent, resolve_node_events};
pub use config::{DebounceConfig, OverlapPolicy};
pub use debounce::{BatchHandler, Debouncer, DebouncerSnapshot, FnHandler};
pub use discovery::{ControlConnection, DataCenterFilter, HostFilter, HostSource};
pub use dispatch::EventDispatcher;
pub use error::TopologyError;
pub use event::{ChangeKind, EventDecoder, NodeChange, Notification, SchemaChange};
pub use lifecycle::NodeLifecycle;
pub use pool::ConnectionPool;
pub use ring::{Host, HostInfo, HostRing, InMemoryRing, NodeState};
