//! # Debouncer：通用事件去抖引擎
//!
//! ## 核心意图（Why）
//! - 集群在滚动重启、扩缩容时会在极短时间内推送大量拓扑/状态通知；逐条处理会放大对环与连接池
//!   的冲击。去抖器把一个突发合并为一次批量回调，同时约束内存占用与回调频率。
//!
//! ## 行为契约（What）
//! - [`Debouncer::debounce`]：任意数量的并发生产者调用；在锁内重置刷新截止时间，并在容量内追加事件，
//!   超出容量时丢弃并告警，从不等待回调；
//! - 刷新：截止时间到达后由后台循环执行，空缓冲不触发回调；非空时摘下当前批次、换入新缓冲，
//!   并在独立任务中交付回调；
//! - [`Debouncer::stop`]：与后台循环握手并等待其退出，幂等；停止时未刷新的事件直接丢弃。
//!
//! ## 实现策略（How）
//! - `parking_lot::Mutex` 只保护“缓冲 + 截止时间”，持锁期间没有 IO，也不会跨越回调；
//! - 后台循环通过 `Notify` 感知截止时间被重置，通过 `oneshot` 接收停止信号，
//!   `JoinHandle` 充当“已退出”的回执；
//! - 交付方式由 [`OverlapPolicy`] 决定，任何策略下刷新循环都不会等待回调完成。
//!
//! ## 风险提示（Trade-offs）
//! - 这是“安静期”去抖：持续不断的事件流会不断推迟刷新，直到缓冲写满后新事件被丢弃；
//! - 必须在 Tokio 运行时内构造，否则派生后台任务会 panic。

use std::{
    fmt, future, mem,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{
    sync::{Mutex as AsyncMutex, Notify, mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::{debug, warn};

use crate::{
    config::{DebounceConfig, MAX_CAPACITY, OverlapPolicy},
    error::TopologyError,
};

/// 批量事件的消费方。
///
/// # 契约（What）
/// - 每次刷新得到一个独立拥有的 `Vec<T>`，不同批次之间不共享可变缓冲；
/// - 在 `Concurrent` 策略下，同一实现可能被并发调用，需自行保证内部同步。
#[async_trait]
pub trait BatchHandler<T: Send + 'static>: Send + Sync + 'static {
    async fn on_batch(&self, batch: Vec<T>);
}

/// 将同步闭包适配为 [`BatchHandler`]。
pub struct FnHandler<F>(F);

impl<F> FnHandler<F> {
    pub fn new(handler: F) -> Self {
        Self(handler)
    }
}

#[async_trait]
impl<T, F> BatchHandler<T> for FnHandler<F>
where
    T: Send + 'static,
    F: Fn(Vec<T>) + Send + Sync + 'static,
{
    async fn on_batch(&self, batch: Vec<T>) {
        (self.0)(batch)
    }
}

/// 去抖器计数快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebouncerSnapshot {
    /// 成功进入缓冲的事件数。
    pub buffered: u64,
    /// 因缓冲已满被丢弃的事件数。
    pub dropped: u64,
    /// 交付给回调（或交付队列）的批次数。
    pub flushes: u64,
    /// 因重叠策略或队列关闭被整体丢弃的批次数。
    pub batches_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    buffered: AtomicU64,
    dropped: AtomicU64,
    flushes: AtomicU64,
    batches_dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DebouncerSnapshot {
        DebouncerSnapshot {
            buffered: self.buffered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
        }
    }
}

struct Pending<T> {
    events: Vec<T>,
    deadline: Option<Instant>,
}

enum Delivery<T> {
    Concurrent,
    Serialize(mpsc::UnboundedSender<Vec<T>>),
    DropWhileBusy(Arc<AsyncMutex<()>>),
}

struct Shared<T: Send + 'static> {
    name: Arc<str>,
    capacity: usize,
    interval: Duration,
    pending: Mutex<Pending<T>>,
    rearm: Notify,
    handler: Arc<dyn BatchHandler<T>>,
    delivery: Delivery<T>,
    counters: Counters,
}

struct Worker {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// 将同类事件的突发合并为批量回调的去抖器。
///
/// # 教案式注释
///
/// ## 状态机 (How)
/// - `Idle`：缓冲为空，无截止时间；
/// - `Buffering`：至少一个事件，截止时间在每次 `debounce` 时重新设置为 `now + interval`；
/// - `Flushing`：截止时间到达，摘下批次并异步交付，随后回到 `Idle`；
/// - `Stopped`：`stop()` 完成后的终态，此后不再有任何刷新。
///
/// ## 契约 (What)
/// - 批次内事件保持调用 `debounce` 的先后顺序；
/// - 缓冲长度永远不超过容量；
/// - `stop()` 返回后，后台循环已退出，不会再触发回调；已交付但尚未执行完的回调不会被取消。
pub struct Debouncer<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    worker: Mutex<Option<Worker>>,
}

impl<T> Debouncer<T>
where
    T: fmt::Debug + Send + 'static,
{
    /// 创建去抖器并立即启动后台刷新循环。
    ///
    /// - **前置条件**：调用方处于 Tokio 运行时上下文中；
    /// - 不校验配置，需要校验时使用 [`Debouncer::try_new`]。
    pub fn new<H>(name: impl Into<Arc<str>>, config: DebounceConfig, handler: H) -> Self
    where
        H: BatchHandler<T>,
    {
        let name = name.into();
        let handler: Arc<dyn BatchHandler<T>> = Arc::new(handler);
        let delivery = match config.overlap() {
            OverlapPolicy::Concurrent => Delivery::Concurrent,
            OverlapPolicy::Serialize => Delivery::Serialize(spawn_serial_consumer(
                Arc::clone(&name),
                Arc::clone(&handler),
            )),
            OverlapPolicy::DropWhileBusy => {
                Delivery::DropWhileBusy(Arc::new(AsyncMutex::new(())))
            }
        };

        let shared = Arc::new(Shared {
            name,
            capacity: config.capacity(),
            interval: config.interval(),
            pending: Mutex::new(Pending {
                events: buffer_with_capacity(config.capacity()),
                deadline: None,
            }),
            rearm: Notify::new(),
            handler,
            delivery,
            counters: Counters::default(),
        });

        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(run_flush_loop(Arc::clone(&shared), stop_rx));

        Self {
            shared,
            worker: Mutex::new(Some(Worker { stop_tx, join })),
        }
    }

    /// 校验配置后创建去抖器。
    pub fn try_new<H>(
        name: impl Into<Arc<str>>,
        config: DebounceConfig,
        handler: H,
    ) -> Result<Self, TopologyError>
    where
        H: BatchHandler<T>,
    {
        config.validate()?;
        Ok(Self::new(name, config, handler))
    }

    /// 缓冲一个事件并重置刷新截止时间。
    ///
    /// # 契约（What）
    /// - 不阻塞在回调上，也不返回错误；
    /// - 缓冲已满时丢弃事件，记录 `warn` 日志并累加 `dropped` 计数，不向生产者施加背压。
    pub fn debounce(&self, event: T) {
        let shared = &self.shared;
        {
            let mut pending = shared.pending.lock();
            match Instant::now().checked_add(shared.interval) {
                Some(deadline) => pending.deadline = Some(deadline),
                None => warn!(
                    debouncer = %shared.name,
                    interval = ?shared.interval,
                    "interval overflows the clock, keeping previous deadline"
                ),
            }

            if pending.events.len() < shared.capacity {
                debug!(debouncer = %shared.name, event = ?event, "buffering event");
                pending.events.push(event);
                shared.counters.buffered.fetch_add(1, Ordering::Relaxed);
            } else {
                warn!(
                    debouncer = %shared.name,
                    capacity = shared.capacity,
                    event = ?event,
                    "buffer full, dropping event"
                );
                shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        shared.rearm.notify_one();
    }

    /// 停止后台刷新循环并等待其退出。
    ///
    /// # 教案式说明
    /// - **逻辑 (How)**：首次调用取出 `Worker`，发送停止信号后等待 `JoinHandle`；
    ///   后续调用发现 `Worker` 已被取走，直接返回。
    /// - **契约 (What)**：返回后不再有新的回调；缓冲中尚未刷新的事件被丢弃，不做最后一次刷新。
    pub async fn stop(&self) {
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            debug!(debouncer = %self.shared.name, "debouncer already stopped");
            return;
        };

        // 循环若已因 panic 退出，接收端已关闭，发送失败无需处理。
        let _ = worker.stop_tx.send(());
        if let Err(err) = worker.join.await {
            warn!(debouncer = %self.shared.name, error = %err, "flush loop terminated abnormally");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.worker.lock().is_none()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// 当前缓冲中尚未刷新的事件数。
    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().events.len()
    }

    pub fn stats(&self) -> DebouncerSnapshot {
        self.shared.counters.snapshot()
    }

    /// 立即刷新当前缓冲，不检查截止时间。
    #[cfg(test)]
    pub(crate) fn flush(&self) {
        let batch = {
            let mut pending = self.shared.pending.lock();
            pending.deadline = None;
            self.shared.take_batch(&mut pending)
        };
        if let Some(batch) = batch {
            self.shared.deliver(batch);
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("name", &self.shared.name)
            .field("capacity", &self.shared.capacity)
            .field("interval", &self.shared.interval)
            .field("stats", &self.shared.counters.snapshot())
            .finish()
    }
}

impl<T> Shared<T>
where
    T: fmt::Debug + Send + 'static,
{
    /// 截止时间到达时刷新；截止时间在等待期间被推迟则跳过。
    fn flush_if_due(&self) {
        let batch = {
            let mut pending = self.pending.lock();
            match pending.deadline {
                Some(deadline) if deadline <= Instant::now() => {}
                _ => return,
            }
            pending.deadline = None;
            self.take_batch(&mut pending)
        };
        if let Some(batch) = batch {
            self.deliver(batch);
        }
    }

    fn take_batch(&self, pending: &mut Pending<T>) -> Option<Vec<T>> {
        debug!(debouncer = %self.name, events = pending.events.len(), "flushing events");
        if pending.events.is_empty() {
            return None;
        }
        Some(mem::replace(
            &mut pending.events,
            buffer_with_capacity(self.capacity),
        ))
    }

    fn deliver(&self, batch: Vec<T>) {
        self.counters.flushes.fetch_add(1, Ordering::Relaxed);
        match &self.delivery {
            Delivery::Concurrent => {
                let handler = Arc::clone(&self.handler);
                tokio::spawn(async move { handler.on_batch(batch).await });
            }
            Delivery::Serialize(queue) => {
                if let Err(mpsc::error::SendError(batch)) = queue.send(batch) {
                    warn!(
                        debouncer = %self.name,
                        events = batch.len(),
                        "serial delivery queue closed, dropping batch"
                    );
                    self.counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Delivery::DropWhileBusy(gate) => match Arc::clone(gate).try_lock_owned() {
                Ok(permit) => {
                    let handler = Arc::clone(&self.handler);
                    tokio::spawn(async move {
                        let _permit = permit;
                        handler.on_batch(batch).await;
                    });
                }
                Err(_) => {
                    warn!(
                        debouncer = %self.name,
                        events = batch.len(),
                        "previous batch still in flight, dropping batch"
                    );
                    self.counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
        }
    }
}

/// 预分配上限为 [`MAX_CAPACITY`]；未经校验的超大容量只影响丢弃阈值，不影响分配。
fn buffer_with_capacity<T>(capacity: usize) -> Vec<T> {
    Vec::with_capacity(capacity.min(MAX_CAPACITY))
}

fn spawn_serial_consumer<T: Send + 'static>(
    name: Arc<str>,
    handler: Arc<dyn BatchHandler<T>>,
) -> mpsc::UnboundedSender<Vec<T>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<T>>();
    tokio::spawn(async move {
        while let Some(batch) = rx.recv().await {
            handler.on_batch(batch).await;
        }
        debug!(debouncer = %name, "serial delivery queue drained");
    });
    tx
}

async fn run_flush_loop<T>(shared: Arc<Shared<T>>, mut stop_rx: oneshot::Receiver<()>)
where
    T: fmt::Debug + Send + 'static,
{
    loop {
        let deadline = shared.pending.lock().deadline;
        tokio::select! {
            biased;
            _ = &mut stop_rx => {
                debug!(debouncer = %shared.name, "flush loop stopped");
                return;
            }
            _ = shared.rearm.notified() => {}
            _ = wait_until(deadline) => shared.flush_if_due(),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
