//! 去抖器配置。
//!
//! # 教案级说明
//! - **Why**：缓冲容量与去抖间隔原本是硬编码常量，这里将其提升为可配置项，并补充回调重叠策略，
//!   让宿主可以依据集群规模与回调耗时调参。
//! - **How**：[`DebounceConfig`] 提供默认值与 builder 风格的 setter；
//!   [`DebounceConfig::from_toml_str`] 借助 `serde` + `toml` 从配置文本加载，缺省键回退到默认值。
//! - **What**：`validate` 拒绝容量为 0、间隔为 0，以及超过 [`MAX_CAPACITY`] / [`MAX_INTERVAL`] 的配置。

use std::time::Duration;

use serde::Deserialize;

use crate::error::TopologyError;

/// 默认缓冲容量：单个去抖窗口内最多保留的事件数。
pub const DEFAULT_CAPACITY: usize = 1000;

/// 默认去抖间隔。
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// 容量上限。缓冲区按容量预分配，过大的值会在构造时耗尽内存。
pub const MAX_CAPACITY: usize = 1_000_000;

/// 间隔上限。
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// 刷新频率快于回调完成速度时的处理策略。
///
/// # 教案式说明
/// - **意图 (Why)**：回调以独立任务执行，刷新循环从不等待它；若回调耗时超过去抖间隔，
///   相邻批次的回调可能重叠。该枚举把这一行为显式化，而不是留给实现偶然决定。
/// - **契约 (What)**：
///   - `Concurrent`：每个批次各自派生任务，允许并发处理，批次之间互不共享可变状态；
///   - `Serialize`：批次进入无界队列，由单一消费任务按刷新顺序逐个处理；
///   - `DropWhileBusy`：上一批尚未处理完时直接丢弃新批次，并记录告警与计数。
/// - **风险 (Trade-offs)**：`Serialize` 在回调持续变慢时会累积积压；`DropWhileBusy` 会丢失成员变更，
///   依赖周期性全量刷新收敛。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    #[default]
    Concurrent,
    Serialize,
    DropWhileBusy,
}

/// 去抖器的运行参数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebounceConfig {
    capacity: usize,
    interval: Duration,
    overlap: OverlapPolicy,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            interval: DEFAULT_INTERVAL,
            overlap: OverlapPolicy::default(),
        }
    }
}

/// 配置文件中的原始形态，所有字段可缺省。
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawDebounceConfig {
    capacity: Option<usize>,
    interval_ms: Option<u64>,
    overlap: Option<OverlapPolicy>,
}

impl DebounceConfig {
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn overlap(&self) -> OverlapPolicy {
        self.overlap
    }

    /// 从 TOML 文本加载配置。
    ///
    /// # 契约（What）
    /// - 支持的键：`capacity`、`interval_ms`、`overlap`（`"concurrent"` / `"serialize"` /
    ///   `"drop-while-busy"`）；
    /// - 缺省键使用默认值，未知键返回 [`TopologyError::ConfigParse`]；
    /// - 返回前执行 [`DebounceConfig::validate`]。
    pub fn from_toml_str(text: &str) -> Result<Self, TopologyError> {
        let raw: RawDebounceConfig = toml::from_str(text)?;
        let defaults = Self::default();
        let config = Self {
            capacity: raw.capacity.unwrap_or(defaults.capacity),
            interval: raw
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            overlap: raw.overlap.unwrap_or(defaults.overlap),
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验参数是否可用于构造去抖器。
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.capacity == 0 {
            return Err(TopologyError::InvalidConfig(
                "capacity must be greater than zero".to_owned(),
            ));
        }
        if self.capacity > MAX_CAPACITY {
            return Err(TopologyError::InvalidConfig(format!(
                "capacity {} exceeds the maximum of {MAX_CAPACITY}",
                self.capacity
            )));
        }
        if self.interval.is_zero() {
            return Err(TopologyError::InvalidConfig(
                "interval must be greater than zero".to_owned(),
            ));
        }
        if self.interval > MAX_INTERVAL {
            return Err(TopologyError::InvalidConfig(format!(
                "interval {:?} exceeds the maximum of {MAX_INTERVAL:?}",
                self.interval
            )));
        }
        Ok(())
    }
}
