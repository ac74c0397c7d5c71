//! 배치 워커 -- 큐에서 항목을 모아 바이트 임계치마다 벌크 요청을 보냅니다.
//!
//! 각 워커는 자신의 큐 수신측과 배치 버퍼를 소유하며 다른 워커와 상태를 공유하지
//! 않습니다 (원자 카운터 제외). 한 워커 안에서는 push 순서가 유지됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use logsift_core::metrics as m;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout_at};
use tracing::{debug, warn};

use crate::backend::{BulkItem, ItemStatus, SearchBackend};
use crate::config::BulkConfig;
use crate::error::ItemError;

/// 항목 결과 채널
pub(crate) type Reply = oneshot::Sender<Result<(), ItemError>>;

/// 큐에 들어간 항목 하나
pub(crate) struct Pending {
    pub item: BulkItem,
    pub reply: Reply,
    /// 과부하로 실패한 횟수
    pub attempts: u32,
}

impl Pending {
    pub fn new(item: BulkItem, reply: Reply) -> Self {
        Self {
            item,
            reply,
            attempts: 0,
        }
    }

    fn resolve(self, result: Result<(), ItemError>) {
        // 호출자가 receipt를 버렸으면 결과도 버림
        let _ = self.reply.send(result);
    }
}

/// 파이프라인 전체가 공유하는 카운터
#[derive(Debug, Default)]
pub(crate) struct PipelineStats {
    pub pushed: AtomicU64,
    pub queued: AtomicU64,
    pub indexed: AtomicU64,
    pub failed: AtomicU64,
    pub retried: AtomicU64,
}

/// 배치 워커
pub(crate) struct BatchWorker<B> {
    id: usize,
    alias: String,
    backend: Arc<B>,
    config: BulkConfig,
    rx: mpsc::UnboundedReceiver<Pending>,
    stats: Arc<PipelineStats>,
    batch: Vec<Pending>,
    batch_bytes: usize,
}

impl<B: SearchBackend> BatchWorker<B> {
    pub fn new(
        id: usize,
        alias: String,
        backend: Arc<B>,
        config: BulkConfig,
        rx: mpsc::UnboundedReceiver<Pending>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            id,
            alias,
            backend,
            config,
            rx,
            stats,
            batch: Vec::new(),
            batch_bytes: 0,
        }
    }

    /// 큐가 닫힐 때까지 실행합니다. 남은 배치는 종료 전에 플러시합니다.
    pub async fn run(mut self) {
        debug!(worker = self.id, alias = %self.alias, "batching worker started");
        let mut deadline = None;

        loop {
            let next = match deadline {
                // 부분 배치가 있으면 flush_interval 안에 임계치에 못 미쳐도 내보냄
                Some(at) => match timeout_at(at, self.rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.flush().await;
                        deadline = None;
                        continue;
                    }
                },
                None => self.rx.recv().await,
            };

            let Some(pending) = next else { break };

            let depth = self.stats.queued.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
            metrics::gauge!(m::INDEXER_QUEUE_DEPTH, m::LABEL_ALIAS => self.alias.clone())
                .set(depth as f64);

            if self.batch.is_empty() {
                deadline = Some(tokio::time::Instant::now() + self.config.flush_interval);
            }
            self.batch_bytes += pending.item.encoded_len();
            self.batch.push(pending);

            if self.batch_bytes >= self.config.batch_bytes {
                self.flush().await;
                deadline = None;
            }
        }

        if !self.batch.is_empty() {
            self.flush().await;
        }
        debug!(worker = self.id, alias = %self.alias, "batching worker drained");
    }

    /// 현재 배치를 전송합니다. 과부하 항목은 백오프 후 다시 보냅니다.
    async fn flush(&mut self) {
        let mut pending = std::mem::take(&mut self.batch);
        self.batch_bytes = 0;
        let mut backoff = self.config.retry_initial_backoff;

        while !pending.is_empty() {
            let items: Vec<BulkItem> = pending.iter().map(|p| p.item.clone()).collect();
            let started = Instant::now();
            let result = self.backend.bulk(&items).await;
            metrics::histogram!(m::INDEXER_BULK_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());

            pending = match result {
                Ok(response) if response.items.len() == pending.len() => {
                    self.record_batch("ok");
                    self.settle_items(pending, response.items)
                }
                Ok(response) => {
                    self.record_batch("error");
                    let reason = format!(
                        "bulk response has {} items for {} requests",
                        response.items.len(),
                        pending.len()
                    );
                    warn!(worker = self.id, alias = %self.alias, %reason, "failing batch");
                    self.fail_all(pending, ItemError::Transport(reason));
                    Vec::new()
                }
                Err(e) if e.is_throttled() => {
                    self.record_batch("throttled");
                    warn!(
                        worker = self.id,
                        alias = %self.alias,
                        items = pending.len(),
                        error = %e,
                        "whole batch throttled"
                    );
                    self.requeue(pending)
                }
                Err(e) => {
                    self.record_batch("error");
                    warn!(
                        worker = self.id,
                        alias = %self.alias,
                        items = pending.len(),
                        error = %e,
                        "bulk request failed"
                    );
                    let error = ItemError::from(&e);
                    self.fail_all(pending, error);
                    Vec::new()
                }
            };

            if !pending.is_empty() {
                let count = pending.len() as u64;
                self.stats.retried.fetch_add(count, Ordering::Relaxed);
                metrics::counter!(m::INDEXER_DOCUMENTS_THROTTLED_TOTAL, m::LABEL_ALIAS => self.alias.clone())
                    .increment(count);
                debug!(
                    worker = self.id,
                    items = count,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying throttled items"
                );
                sleep(backoff).await;
                backoff = self.config.next_backoff(backoff);
            }
        }
    }

    /// 항목별 결과를 처리하고 재시도할 항목을 반환합니다.
    fn settle_items(&self, pending: Vec<Pending>, statuses: Vec<ItemStatus>) -> Vec<Pending> {
        let mut retry = Vec::new();
        for (mut p, status) in pending.into_iter().zip(statuses) {
            match status {
                ItemStatus::Ok => {
                    self.stats.indexed.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(m::INDEXER_DOCUMENTS_INDEXED_TOTAL, m::LABEL_ALIAS => self.alias.clone())
                        .increment(1);
                    p.resolve(Ok(()));
                }
                ItemStatus::Throttled { .. } => {
                    p.attempts += 1;
                    if self.config.may_retry(p.attempts) {
                        retry.push(p);
                    } else {
                        let attempts = p.attempts;
                        self.fail(p, ItemError::Throttled { attempts });
                    }
                }
                ItemStatus::Failed { status, reason } => {
                    debug!(worker = self.id, status, %reason, "item rejected");
                    self.fail(p, ItemError::Rejected { status, reason });
                }
            }
        }
        retry
    }

    /// 배치 전체를 재시도 대상으로 돌립니다. 한도를 넘은 항목은 실패 처리합니다.
    fn requeue(&self, pending: Vec<Pending>) -> Vec<Pending> {
        let mut retry = Vec::with_capacity(pending.len());
        for mut p in pending {
            p.attempts += 1;
            if self.config.may_retry(p.attempts) {
                retry.push(p);
            } else {
                let attempts = p.attempts;
                self.fail(p, ItemError::Throttled { attempts });
            }
        }
        retry
    }

    fn fail_all(&self, pending: Vec<Pending>, error: ItemError) {
        for p in pending {
            self.fail(p, error.clone());
        }
    }

    fn fail(&self, pending: Pending, error: ItemError) {
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::INDEXER_DOCUMENTS_FAILED_TOTAL, m::LABEL_ALIAS => self.alias.clone())
            .increment(1);
        pending.resolve(Err(error));
    }

    fn record_batch(&self, result: &'static str) {
        metrics::counter!(
            m::INDEXER_BATCHES_TOTAL,
            m::LABEL_ALIAS => self.alias.clone(),
            m::LABEL_RESULT => result
        )
        .increment(1);
    }
}
