//! 已解码的集群事件通知模型。
//!
//! # 教案级说明
//! - **Why**：帧解码属于外部协作者，本模块只定义解码产物的形态，以及解码器需要实现的接缝
//!   [`EventDecoder`]，让分发入口与具体线协议解耦。
//! - **What**：[`Notification`] 是封闭的变体集合，一经产生即不可变；拓扑变更与状态变更共享
//!   [`NodeChange`] 载荷，Schema 变更被识别但不会被本 crate 处理。

use std::{fmt, net::IpAddr, str::FromStr};

use crate::error::TopologyError;

/// 节点变更类型，对应线协议中的字符串取值。
///
/// # 契约（What）
/// - `NewNode` / `RemovedNode` / `MovedNode` 来自拓扑变更，`Up` / `Down` 来自状态变更；
/// - `MovedNode` 可被解析，但聚合器有意不处理（仅记录日志）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    NewNode,
    RemovedNode,
    MovedNode,
    Up,
    Down,
}

impl ChangeKind {
    /// 返回线协议中的字符串表示。
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewNode => "NEW_NODE",
            Self::RemovedNode => "REMOVED_NODE",
            Self::MovedNode => "MOVED_NODE",
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = TopologyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "NEW_NODE" => Ok(Self::NewNode),
            "REMOVED_NODE" => Ok(Self::RemovedNode),
            "MOVED_NODE" => Ok(Self::MovedNode),
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            other => Err(TopologyError::UnknownChangeKind(other.to_owned())),
        }
    }
}

/// 单个节点的拓扑/状态变更载荷。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeChange {
    pub change: ChangeKind,
    pub host: IpAddr,
    pub port: u16,
}

impl NodeChange {
    pub fn new(change: ChangeKind, host: IpAddr, port: u16) -> Self {
        Self { change, host, port }
    }

    /// 节点在环中的索引键，即主机地址的字符串形式。
    pub fn address(&self) -> String {
        self.host.to_string()
    }
}

/// Schema 变更的动作。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaChangeType {
    Created,
    Updated,
    Dropped,
}

/// Schema 变更作用的对象。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaTarget {
    Keyspace,
    Table,
    Type,
    Function,
    Aggregate,
}

/// Schema 变更通知：识别但不处理。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaChange {
    pub change: SchemaChangeType,
    pub target: SchemaTarget,
    pub keyspace: String,
    /// 非 keyspace 级变更时的对象名。
    pub name: Option<String>,
}

/// 解码后的一条事件通知。
///
/// # 教案式说明
/// - **意图 (Why)**：把线协议中的 `TOPOLOGY_CHANGE` / `STATUS_CHANGE` / `SCHEMA_CHANGE` 映射为
///   强类型变体，分发入口据此决定“去抖 / 忽略 / 告警丢弃”；
/// - **契约 (What)**：`Unrecognized` 承载解码器认识帧格式、但本 crate 不认识的事件类型，
///   分发入口会把它记录为非法事件并丢弃。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    TopologyChange(NodeChange),
    StatusChange(NodeChange),
    SchemaChange(SchemaChange),
    Unrecognized { event_type: String },
}

impl Notification {
    pub fn topology(change: ChangeKind, host: IpAddr, port: u16) -> Self {
        Self::TopologyChange(NodeChange::new(change, host, port))
    }

    pub fn status(change: ChangeKind, host: IpAddr, port: u16) -> Self {
        Self::StatusChange(NodeChange::new(change, host, port))
    }

    /// 若为节点相关通知，返回其载荷。
    pub fn node_change(&self) -> Option<&NodeChange> {
        match self {
            Self::TopologyChange(change) | Self::StatusChange(change) => Some(change),
            Self::SchemaChange(_) | Self::Unrecognized { .. } => None,
        }
    }
}

/// 外部帧解码器的接缝。
///
/// # 契约（What）
/// - 每次调用把一帧原始字节解码为一条 [`Notification`]；
/// - 失败时返回 [`TopologyError::Decode`]，调用方记录后丢弃该帧，不做重试。
pub trait EventDecoder: Send + Sync {
    fn decode(&self, frame: &[u8]) -> Result<Notification, TopologyError>;
}
