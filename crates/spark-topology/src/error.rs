//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为拓扑事件链路（解码、配置、元数据拉取、日志安装）提供集中定义的错误域；
//! - 这些错误在检测点即被记录并终止，不会回传给通知的生产者，统一枚举只是为了让日志与
//!   上层装配代码拥有一致的诊断语义。
//!
//! ## 设计要求（What）
//! - 所有变体派生 [`thiserror::Error`]，可直接交给 `anyhow` 等上层框架；
//! - 每个变体提供稳定的 `spark.topology.*` 错误码，便于日志检索与告警聚合。

use std::net::IpAddr;

use thiserror::Error;

/// 拓扑事件子系统的统一错误类型。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“帧无法解析”“节点元数据拉取失败”“配置非法”等失败路径，保证
///   运维在日志中能依据错误码快速定位来源。
/// - **契约 (What)**：
///   - 所有变体均为 `Send + Sync + 'static`，可安全跨任务传递；
///   - [`TopologyError::code`] 返回的字符串在版本之间保持稳定。
/// - **设计权衡 (Trade-offs)**：上下文统一以 `String` 保存，牺牲少量分配换取可读性。
#[derive(Debug, Error)]
pub enum TopologyError {
    /// 事件帧无法被解码。
    #[error("unable to parse event frame: {reason}")]
    Decode { reason: String },

    /// 控制连接拉取节点元数据失败。
    #[error("unable to fetch host info for {host}:{port}: {reason}")]
    FetchHostInfo {
        host: IpAddr,
        port: u16,
        reason: String,
    },

    /// 出现无法识别的拓扑/状态变更类型。
    #[error("unknown node change kind `{0}`")]
    UnknownChangeKind(String),

    /// 去抖配置未通过校验。
    #[error("invalid debounce configuration: {0}")]
    InvalidConfig(String),

    /// 去抖配置文本无法解析为 TOML。
    #[error("failed to parse debounce configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// 安装 tracing Subscriber 失败。
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(String),
}

impl TopologyError {
    /// 构造解码失败错误。
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// 构造元数据拉取失败错误。
    pub fn fetch_host_info(host: IpAddr, port: u16, reason: impl Into<String>) -> Self {
        Self::FetchHostInfo {
            host,
            port,
            reason: reason.into(),
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "spark.topology.decode_failed",
            Self::FetchHostInfo { .. } => "spark.topology.fetch_host_info_failed",
            Self::UnknownChangeKind(_) => "spark.topology.unknown_change_kind",
            Self::InvalidConfig(_) => "spark.topology.invalid_config",
            Self::ConfigParse(_) => "spark.topology.config_parse_failed",
            Self::Telemetry(_) => "spark.topology.telemetry_install_failed",
        }
    }
}
