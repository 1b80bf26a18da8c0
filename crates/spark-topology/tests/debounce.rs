//! `Debouncer` 的批量交付、容量与停止契约。
//!
//! # 教案式说明
//! - **Why**：去抖器是整条链路上唯一存在共享缓冲、定时刷新与后台握手的组件，回归最容易表现为
//!   “回调次数不对”或“停止后仍有回调”；
//! - **How**：全部用例在暂停的 Tokio 时钟下运行，时间只在运行时空闲时推进，断言不依赖真实耗时；
//! - **What**：每个用例都以显式的批次内容与计数快照作为验收标准。

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use spark_topology::{BatchHandler, DebounceConfig, Debouncer, FnHandler, OverlapPolicy};
use tokio::{
    sync::mpsc,
    time::{sleep, timeout},
};

fn channel_handler<T: Send + 'static>() -> (
    FnHandler<impl Fn(Vec<T>) + Send + Sync + 'static>,
    mpsc::UnboundedReceiver<Vec<T>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = FnHandler::new(move |batch: Vec<T>| {
        let _ = tx.send(batch);
    });
    (handler, rx)
}

/// 处理每个批次都耗时 `delay` 的回调，并记录最大并发数。
struct SlowHandler {
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    done: mpsc::UnboundedSender<Vec<u32>>,
}

impl SlowHandler {
    fn new(delay: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<u32>>) {
        let (done, rx) = mpsc::unbounded_channel();
        let handler = Arc::new(Self {
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            done,
        });
        (handler, rx)
    }
}

/// 让测试在去抖器之外保留对处理器的引用。
struct Shared(Arc<SlowHandler>);

#[async_trait]
impl BatchHandler<u32> for Shared {
    async fn on_batch(&self, batch: Vec<u32>) {
        let handler = &self.0;
        let active = handler.active.fetch_add(1, Ordering::SeqCst) + 1;
        handler.max_active.fetch_max(active, Ordering::SeqCst);
        sleep(handler.delay).await;
        handler.active.fetch_sub(1, Ordering::SeqCst);
        let _ = handler.done.send(batch);
    }
}

#[tokio::test(start_paused = true)]
async fn burst_within_one_window_is_delivered_once_in_order() {
    let (handler, mut rx) = channel_handler();
    let debouncer: Debouncer<u32> = Debouncer::new("burst", DebounceConfig::default(), handler);

    for event in 0..100 {
        debouncer.debounce(event);
    }

    assert_eq!(rx.recv().await, Some((0..100).collect::<Vec<_>>()));
    sleep(Duration::from_secs(5)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(debouncer.stats().flushes, 1);
    debouncer.stop().await;
}

#[tokio::test(start_paused = true)]
async fn every_new_event_pushes_the_flush_back() {
    let (handler, mut rx) = channel_handler();
    let debouncer: Debouncer<u32> = Debouncer::new("quiet", DebounceConfig::default(), handler);

    debouncer.debounce(1);
    sleep(Duration::from_millis(600)).await;
    debouncer.debounce(2);
    sleep(Duration::from_millis(600)).await;
    debouncer.debounce(3);
    sleep(Duration::from_millis(800)).await;
    assert!(rx.try_recv().is_err(), "flushed before the window went quiet");

    assert_eq!(rx.recv().await, Some(vec![1, 2, 3]));
    debouncer.stop().await;
}

#[tokio::test(start_paused = true)]
async fn separate_windows_produce_separate_batches() {
    let (handler, mut rx) = channel_handler();
    let debouncer: Debouncer<u32> = Debouncer::new("windows", DebounceConfig::default(), handler);

    debouncer.debounce(1);
    assert_eq!(rx.recv().await, Some(vec![1]));
    debouncer.debounce(2);
    debouncer.debounce(3);
    assert_eq!(rx.recv().await, Some(vec![2, 3]));
    assert_eq!(debouncer.stats().flushes, 2);
    debouncer.stop().await;
}

#[tokio::test(start_paused = true)]
async fn overflow_keeps_exactly_capacity_events() {
    let (handler, mut rx) = channel_handler();
    let debouncer: Debouncer<u32> = Debouncer::new("full", DebounceConfig::default(), handler);

    for event in 0..1005 {
        debouncer.debounce(event);
    }

    let batch = rx.recv().await.expect("one batch");
    assert_eq!(batch.len(), 1000);
    assert_eq!(batch.last(), Some(&999));
    let stats = debouncer.stats();
    assert_eq!(stats.buffered, 1000);
    assert_eq!(stats.dropped, 5);
    debouncer.stop().await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_producers_keep_their_own_order() {
    let (handler, mut rx) = channel_handler();
    let debouncer: Arc<Debouncer<(u32, u32)>> = Arc::new(Debouncer::new(
        "producers",
        DebounceConfig::default(),
        handler,
    ));

    let mut producers = Vec::new();
    for producer in 0..4 {
        let debouncer = Arc::clone(&debouncer);
        producers.push(tokio::spawn(async move {
            for seq in 0..50 {
                debouncer.debounce((producer, seq));
                tokio::task::yield_now().await;
            }
        }));
    }
    for producer in producers {
        producer.await.expect("producer finished");
    }

    let batch = rx.recv().await.expect("one batch");
    assert_eq!(batch.len(), 200);
    for producer in 0..4 {
        let seqs: Vec<u32> = batch
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|(_, seq)| *seq)
            .collect();
        assert_eq!(seqs, (0..50).collect::<Vec<_>>());
    }
    debouncer.stop().await;
}

#[tokio::test(start_paused = true)]
async fn nothing_is_flushed_after_stop() {
    let (handler, mut rx) = channel_handler();
    let debouncer: Debouncer<u32> = Debouncer::new("stopped", DebounceConfig::default(), handler);

    debouncer.debounce(1);
    debouncer.stop().await;
    debouncer.debounce(2);
    debouncer.debounce(3);

    sleep(Duration::from_secs(10)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(debouncer.pending_len(), 3);
    assert_eq!(debouncer.stats().flushes, 0);
    assert!(debouncer.is_stopped());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_debouncer_ends_the_flush_loop() {
    let (handler, mut rx) = channel_handler();
    let debouncer: Debouncer<u32> = Debouncer::new("dropped", DebounceConfig::default(), handler);
    debouncer.debounce(1);
    drop(debouncer);

    // 发送端随处理器一起释放，接收端应在不产生任何批次的情况下关闭。
    let next = timeout(Duration::from_secs(10), rx.recv()).await;
    assert_eq!(next, Ok(None));
}

/// 在 1s 去抖间隔、5s 回调耗时下制造两个重叠批次：
/// 批次 `[1]` 在 t=1s 交付，批次 `[2]` 在 t=2.5s 交付，此时前者仍在处理。
async fn overlapping_batches(debouncer: &Debouncer<u32>) {
    debouncer.debounce(1);
    sleep(Duration::from_millis(1500)).await;
    debouncer.debounce(2);
    sleep(Duration::from_millis(1500)).await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_policy_lets_callbacks_overlap() {
    let (slow, mut rx) = SlowHandler::new(Duration::from_secs(5));
    let config = DebounceConfig::default().with_overlap(OverlapPolicy::Concurrent);
    let debouncer = Debouncer::new("concurrent", config, Shared(Arc::clone(&slow)));

    overlapping_batches(&debouncer).await;

    assert_eq!(rx.recv().await, Some(vec![1]));
    assert_eq!(rx.recv().await, Some(vec![2]));
    assert_eq!(slow.max_active.load(Ordering::SeqCst), 2);
    debouncer.stop().await;
}

#[tokio::test(start_paused = true)]
async fn serialize_policy_runs_batches_one_at_a_time_in_order() {
    let (slow, mut rx) = SlowHandler::new(Duration::from_secs(5));
    let config = DebounceConfig::default().with_overlap(OverlapPolicy::Serialize);
    let debouncer = Debouncer::new("serial", config, Shared(Arc::clone(&slow)));

    overlapping_batches(&debouncer).await;

    assert_eq!(rx.recv().await, Some(vec![1]));
    assert_eq!(rx.recv().await, Some(vec![2]));
    assert_eq!(slow.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(debouncer.stats().batches_dropped, 0);
    debouncer.stop().await;
}

#[tokio::test(start_paused = true)]
async fn drop_while_busy_policy_discards_the_overlapping_batch() {
    let (slow, mut rx) = SlowHandler::new(Duration::from_secs(5));
    let config = DebounceConfig::default().with_overlap(OverlapPolicy::DropWhileBusy);
    let debouncer = Debouncer::new("drop", config, Shared(Arc::clone(&slow)));

    overlapping_batches(&debouncer).await;
    assert_eq!(debouncer.stats().batches_dropped, 1);

    assert_eq!(rx.recv().await, Some(vec![1]));
    sleep(Duration::from_secs(10)).await;
    assert!(rx.try_recv().is_err());

    // 前一批处理完成后，新的批次重新被接受。
    debouncer.debounce(3);
    assert_eq!(rx.recv().await, Some(vec![3]));
    debouncer.stop().await;
}
