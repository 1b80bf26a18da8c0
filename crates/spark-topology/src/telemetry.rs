//! tracing 日志安装入口。
//!
//! # 教案级说明
//! - **Why**：本 crate 的全部诊断都经由 `tracing` 宏输出；独立运行（演示、排障）时需要一个
//!   最小的 Subscriber 把它们打印出来。
//! - **How**：`EnvFilter` 优先读取 `RUST_LOG`，缺省时回退到调用方给出的指令，再叠加 `fmt` 层。
//! - **What**：全局 Subscriber 已存在时返回 [`TopologyError::Telemetry`]，不会覆盖宿主的配置。

use tracing_subscriber::{EnvFilter, fmt};

use crate::error::TopologyError;

/// 安装全局 `fmt` Subscriber。
pub fn init_tracing(default_directive: &str) -> Result<(), TopologyError> {
    fmt()
        .with_env_filter(build_env_filter(default_directive))
        .with_target(true)
        .try_init()
        .map_err(|err| TopologyError::Telemetry(err.to_string()))
}

fn build_env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}
