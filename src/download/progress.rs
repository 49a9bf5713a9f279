//!
//! # 进度汇总模块
//! 定时汇总所有 worker 的字节计数
//!

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use crate::download::state::DownloadState;

/// Per-worker byte counters. Each counter has exactly one writing task.
#[derive(Debug, Clone)]
pub struct ProgressCounters {
    counters: Vec<Arc<AtomicU64>>,
}

impl ProgressCounters {
    pub fn new(worker_count: usize) -> Self {
        Self {
            counters: (0..worker_count).map(|_| Arc::new(AtomicU64::new(0))).collect(),
        }
    }

    pub fn counter(&self, index: usize) -> Arc<AtomicU64> {
        self.counters[index].clone()
    }

    pub fn downloaded(&self) -> u64 {
        self.counters.iter().map(|counter| counter.load(Ordering::Relaxed)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub downloaded: u64,
    pub total: Option<u64>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> u8 {
        match self.total {
            Some(total) if total > 0 => (self.downloaded.min(total) * 100 / total) as u8,
            _ => 0,
        }
    }

    pub fn bytes_per_second(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0;
        }
        (self.downloaded as f64 / secs) as u64
    }

    pub fn to_state(&self) -> DownloadState {
        DownloadState::Progress {
            percent: self.percent(),
            downloaded: self.downloaded,
            total: self.total,
            bytes_per_second: self.bytes_per_second(),
        }
    }
}

/// Timer task emitting one `Progress` state per tick until stopped or until every byte is counted.
pub struct ProgressAggregator {
    stop_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressAggregator {
    pub fn spawn(
        counters: ProgressCounters,
        total: Option<u64>,
        interval: Duration,
        state_sender: UnboundedSender<DownloadState>,
    ) -> Self {
        let stop_token = CancellationToken::new();
        let stop = stop_token.clone();

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let snapshot = ProgressSnapshot {
                    downloaded: counters.downloaded(),
                    total,
                    elapsed: started.elapsed(),
                };
                if state_sender.send(snapshot.to_state()).is_err() {
                    break;
                }

                if matches!(total, Some(total) if snapshot.downloaded >= total) {
                    break;
                }
            }
        });

        Self { stop_token, handle }
    }

    /// Stops ticking and waits for the task, so no snapshot is emitted after this returns.
    pub async fn stop(self) {
        self.stop_token.cancel();
        let _ = self.handle.await;
    }
}
