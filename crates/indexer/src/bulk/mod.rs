//! 벌크 인덱싱 파이프라인 -- 새 인덱스 세대를 만들고 문서를 적재한 뒤 별칭을 전환합니다.
//!
//! # 상태 전이
//! ```text
//! Created --start()--> Indexing --end()--> Finalizing --> Done
//!    │                                         │
//!    └──── 인덱스 생성 실패 ──> Failed <── refresh/merge/alias 실패
//!                                 ▲
//!                   Indexing ─────┘ abort(): 새 세대 인덱스 삭제
//! ```
//!
//! # 내부 아키텍처
//! ```text
//! push() -> round-robin -> [queue 0] -> BatchWorker 0 -> bulk ─┐
//!                       -> [queue 1] -> BatchWorker 1 -> bulk ─┤
//!                                                              ▼
//!                                    end(): refresh -> force-merge -> _aliases
//! ```
//!
//! `push()`는 네트워크 I/O를 기다리지 않습니다. 백프레셔는 워커별 무제한 큐에 쌓이고
//! 항목 결과는 [`ItemReceipt`]로 정확히 한 번 전달됩니다.

mod worker;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use logsift_core::error::BackendError;
use logsift_core::metrics as m;
use logsift_core::types::LogDocument;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backend::{AliasAction, BulkAction, BulkItem, BulkOp, SearchBackend};
use crate::config::BulkConfig;
use crate::error::{IndexerError, ItemError};
use crate::permalink::Locator;

use worker::{BatchWorker, Pending, PipelineStats};

/// 인덱스 이름의 타임스탬프 형식 (밀리초까지)
const GENERATION_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// force-merge 목표 세그먼트 수
const MERGE_MAX_SEGMENTS: u32 = 1;

/// 파이프라인 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// 생성됨, 아직 인덱스 없음
    Created,
    /// 인덱스 생성 완료, push 가능
    Indexing,
    /// 워커 정리 및 마무리 중
    Finalizing,
    /// 별칭 전환 완료
    Done,
    /// 인덱스 생성 또는 마무리 실패
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Indexing => "indexing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 별칭에서 새 세대 인덱스 이름을 만듭니다: `<alias>-<yyyymmddHHMMSSmmm>`
pub fn generation_name(alias: &str, now: DateTime<Utc>) -> String {
    format!("{alias}-{}", now.format(GENERATION_FORMAT))
}

/// 별칭의 모든 세대와 일치하는 인덱스 패턴: `<alias>-*`
pub fn generation_pattern(alias: &str) -> String {
    format!("{alias}-*")
}

/// 항목 하나의 결과를 기다리는 one-shot future
///
/// 워커가 결과를 보내기 전에 사라지면 [`ItemError::Aborted`]로 완료됩니다.
#[derive(Debug)]
pub struct ItemReceipt {
    rx: oneshot::Receiver<Result<(), ItemError>>,
}

impl Future for ItemReceipt {
    type Output = Result<(), ItemError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(ItemError::Aborted(
                    "batching worker dropped the item".to_owned(),
                ))
            })
        })
    }
}

/// 적재 결과 요약
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// 새로 만든 인덱스
    pub index: String,
    /// 전환된 별칭
    pub alias: String,
    /// 별칭에서 제거된 이전 세대
    pub replaced: Vec<String>,
    /// push된 항목 수
    pub pushed: u64,
    /// 색인 성공 항목 수
    pub indexed: u64,
    /// 실패 항목 수
    pub failed: u64,
    /// 과부하로 재전송된 횟수 (항목 단위)
    pub retried: u64,
    /// start부터 end까지 걸린 시간
    pub elapsed: Duration,
}

/// 벌크 인덱싱 파이프라인
///
/// # 사용 예시
/// ```ignore
/// let mut indexer = BulkIndexer::new(backend, "syslog", default_mapping(), config)?;
/// indexer.start().await?;
/// let receipt = indexer.push_document(&doc)?;
/// let summary = indexer.end().await?;
/// receipt.await?;
/// ```
pub struct BulkIndexer<B: SearchBackend> {
    backend: Arc<B>,
    alias: String,
    mapping: Value,
    config: BulkConfig,
    state: PipelineState,
    index: Option<String>,
    senders: Vec<mpsc::UnboundedSender<Pending>>,
    workers: Vec<JoinHandle<()>>,
    next_worker: usize,
    stats: Arc<PipelineStats>,
    started_at: Option<Instant>,
}

impl<B: SearchBackend> BulkIndexer<B> {
    /// 파이프라인을 생성합니다. 아직 백엔드를 호출하지 않습니다.
    ///
    /// # Errors
    ///
    /// 별칭이 비어 있거나 설정이 유효하지 않으면 에러를 반환합니다.
    pub fn new(
        backend: Arc<B>,
        alias: impl Into<String>,
        mapping: Value,
        config: BulkConfig,
    ) -> Result<Self, IndexerError> {
        let alias = alias.into();
        if alias.is_empty() {
            return Err(IndexerError::Config {
                field: "alias".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        config.validate()?;

        Ok(Self {
            backend,
            alias,
            mapping,
            config,
            state: PipelineState::Created,
            index: None,
            senders: Vec::new(),
            workers: Vec::new(),
            next_worker: 0,
            stats: Arc::new(PipelineStats::default()),
            started_at: None,
        })
    }

    /// 현재 상태
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// 대상 별칭
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// 적재 중인 인덱스 이름 (start 이후)
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// push된 항목 수
    pub fn pushed(&self) -> u64 {
        self.stats.pushed.load(Ordering::Relaxed)
    }

    /// 새 세대 인덱스를 만들고 배치 워커를 시작합니다.
    pub async fn start(&mut self) -> Result<&str, IndexerError> {
        if self.state != PipelineState::Created {
            return Err(IndexerError::invalid_state("created", self.state));
        }

        let index = generation_name(&self.alias, Utc::now());
        let body = self.index_body();
        if let Err(e) = self.backend.create_index(&index, &body).await {
            self.state = PipelineState::Failed;
            error!(alias = %self.alias, index = %index, error = %e, "failed to create index");
            return Err(e.into());
        }

        for id in 0..self.config.workers {
            let (tx, rx) = mpsc::unbounded_channel();
            let worker = BatchWorker::new(
                id,
                self.alias.clone(),
                Arc::clone(&self.backend),
                self.config.clone(),
                rx,
                Arc::clone(&self.stats),
            );
            self.senders.push(tx);
            self.workers.push(tokio::spawn(worker.run()));
        }

        info!(
            alias = %self.alias,
            index = %index,
            workers = self.config.workers,
            batch_bytes = self.config.batch_bytes,
            "bulk load started"
        );
        self.started_at = Some(Instant::now());
        self.state = PipelineState::Indexing;
        Ok(self.index.insert(index).as_str())
    }

    /// 문서를 워커 큐에 넣습니다. 네트워크 I/O를 기다리지 않습니다.
    ///
    /// `id`가 없으면 백엔드가 id를 부여합니다. `doc_type`은 구형 매핑 타입입니다.
    pub fn push<T: Serialize>(
        &mut self,
        doc: &T,
        id: Option<&str>,
        doc_type: Option<&str>,
    ) -> Result<ItemReceipt, IndexerError> {
        if self.state != PipelineState::Indexing {
            return Err(IndexerError::invalid_state("indexing", self.state));
        }
        let Some(index) = self.index.clone() else {
            return Err(IndexerError::invalid_state("indexing", "no index"));
        };

        let source =
            serde_json::to_vec(doc).map_err(|e| IndexerError::Serialization(e.to_string()))?;
        let item = BulkItem::new(
            BulkAction {
                op: BulkOp::Index,
                index,
                id: id.map(str::to_owned),
                doc_type: doc_type.map(str::to_owned),
            },
            Bytes::from(source),
        );

        let (reply, rx) = oneshot::channel();
        let worker = self.next_worker;
        self.next_worker = (self.next_worker + 1) % self.senders.len().max(1);

        let depth = self.stats.queued.fetch_add(1, Ordering::Relaxed) + 1;
        let sender = self
            .senders
            .get(worker)
            .ok_or_else(|| IndexerError::WorkerLost(format!("worker {worker} missing")))?;
        if sender.send(Pending::new(item, reply)).is_err() {
            self.stats.queued.fetch_sub(1, Ordering::Relaxed);
            return Err(IndexerError::WorkerLost(format!(
                "worker {worker} stopped accepting items"
            )));
        }

        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        metrics::gauge!(m::INDEXER_QUEUE_DEPTH, m::LABEL_ALIAS => self.alias.clone())
            .set(depth as f64);
        Ok(ItemReceipt { rx })
    }

    /// 공통 스키마 문서를 `recordFinder`를 id로 하여 넣습니다.
    ///
    /// # Errors
    ///
    /// `recordFinder`로 permalink를 만들 수 없는 문서(locator 구분자 포함)는
    /// 색인하지 않고 `Validation` 에러를 반환합니다.
    pub fn push_document(&mut self, doc: &LogDocument) -> Result<ItemReceipt, IndexerError> {
        if doc.record_finder.is_empty() {
            return self.push(doc, None, None);
        }
        Locator::from_document(doc)?;
        self.push(doc, Some(doc.record_finder.as_str()), None)
    }

    /// 적재를 중단하고 별칭에 연결되지 않은 새 세대 인덱스를 삭제합니다.
    ///
    /// `Indexing` 상태 또는 마무리에 실패한 `Failed` 상태에서 호출할 수 있습니다.
    /// 아직 결과를 받지 못한 항목의 receipt는 [`ItemError::Aborted`]로 완료됩니다.
    pub async fn abort(&mut self) -> Result<(), IndexerError> {
        let index = match (self.state, self.index.clone()) {
            (PipelineState::Indexing | PipelineState::Failed, Some(index)) => index,
            _ => return Err(IndexerError::invalid_state("indexing", self.state)),
        };
        self.state = PipelineState::Failed;
        self.senders.clear();
        for handle in self.workers.drain(..) {
            handle.abort();
        }

        warn!(
            alias = %self.alias,
            index = %index,
            pushed = self.pushed(),
            "bulk load aborted, deleting index"
        );
        self.backend.delete_index(&index).await?;
        Ok(())
    }

    /// 워커를 모두 비운 뒤 refresh, force-merge, 별칭 전환을 수행합니다.
    pub async fn end(&mut self) -> Result<LoadSummary, IndexerError> {
        if self.state != PipelineState::Indexing {
            return Err(IndexerError::invalid_state("indexing", self.state));
        }
        self.state = PipelineState::Finalizing;

        match self.finalize().await {
            Ok(summary) => {
                self.state = PipelineState::Done;
                info!(
                    alias = %summary.alias,
                    index = %summary.index,
                    indexed = summary.indexed,
                    failed = summary.failed,
                    retried = summary.retried,
                    replaced = ?summary.replaced,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "bulk load finished"
                );
                Ok(summary)
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                error!(alias = %self.alias, error = %e, "bulk load finalization failed");
                Err(e)
            }
        }
    }

    async fn finalize(&mut self) -> Result<LoadSummary, IndexerError> {
        let index = self
            .index
            .clone()
            .ok_or_else(|| IndexerError::invalid_state("indexing", "no index"))?;

        // 송신측을 닫으면 워커는 남은 항목을 플러시하고 종료함
        self.senders.clear();
        for handle in self.workers.drain(..) {
            handle
                .await
                .map_err(|e| IndexerError::WorkerLost(e.to_string()))?;
        }

        self.backend.refresh(&index).await?;

        let merge_timeout = self.config.merge_timeout;
        match tokio::time::timeout(
            merge_timeout,
            self.backend
                .force_merge(&index, MERGE_MAX_SEGMENTS, merge_timeout),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(BackendError::Timeout {
                    operation: "force_merge".to_owned(),
                    secs: merge_timeout.as_secs(),
                }
                .into());
            }
        }

        let replaced = self.cut_over(&index).await?;

        Ok(LoadSummary {
            index,
            alias: self.alias.clone(),
            replaced,
            pushed: self.stats.pushed.load(Ordering::Relaxed),
            indexed: self.stats.indexed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            retried: self.stats.retried.load(Ordering::Relaxed),
            elapsed: self.started_at.map(|t| t.elapsed()).unwrap_or_default(),
        })
    }

    /// 새 인덱스를 별칭에 붙이고 이전 세대를 모두 떼어냅니다. 한 번의 호출로 수행됩니다.
    async fn cut_over(&self, index: &str) -> Result<Vec<String>, IndexerError> {
        let previous: Vec<String> = self
            .backend
            .get_alias(&self.alias)
            .await?
            .into_iter()
            .filter(|bound| bound != index)
            .collect();

        let mut actions = vec![AliasAction::Add {
            index: index.to_owned(),
            alias: self.alias.clone(),
        }];
        actions.extend(previous.iter().map(|old| AliasAction::Remove {
            index: old.clone(),
            alias: self.alias.clone(),
        }));

        self.backend.update_aliases(&actions).await?;
        if previous.len() > 1 {
            warn!(
                alias = %self.alias,
                previous = ?previous,
                "alias held more than one generation before cutover"
            );
        }
        Ok(previous)
    }

    fn index_body(&self) -> Value {
        let mut body = json!({
            "settings": {
                "index": {
                    "refresh_interval": "-1",
                    "number_of_replicas": 0
                }
            }
        });
        if !self.mapping.is_null() {
            body["mappings"] = self.mapping.clone();
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::{BulkResponse, ItemStatus};
    use chrono::TimeZone;

    fn config() -> BulkConfig {
        BulkConfig::builder()
            .workers(2)
            .batch_bytes(1_024)
            .retry_backoff(Duration::from_millis(10), Duration::from_millis(40))
            .build()
            .unwrap()
    }

    fn doc(i: usize) -> Value {
        json!({ "recordFinder": format!("r-{i:03}"), "message": "login failed" })
    }

    #[test]
    fn generation_name_uses_millisecond_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 45).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(generation_name("syslog", now), "syslog-20240115123045123");
        assert_eq!(generation_pattern("syslog"), "syslog-*");
    }

    #[test]
    fn new_rejects_empty_alias() {
        let backend = Arc::new(MockBackend::new());
        assert!(BulkIndexer::new(backend, "", Value::Null, config()).is_err());
    }

    #[tokio::test]
    async fn push_before_start_is_invalid_state() {
        let backend = Arc::new(MockBackend::new());
        let mut indexer = BulkIndexer::new(backend, "syslog", Value::Null, config()).unwrap();
        let err = indexer.push(&doc(0), None, None).unwrap_err();
        assert!(err.to_string().contains("created"));
        assert!(indexer.end().await.is_err());
    }

    #[tokio::test]
    async fn start_creates_index_with_refresh_disabled() {
        let backend = Arc::new(MockBackend::new());
        let mapping = json!({ "properties": { "message": { "type": "text" } } });
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", mapping, config()).unwrap();
        let index = indexer.start().await.unwrap().to_owned();
        assert!(index.starts_with("syslog-"));
        assert_eq!(indexer.state(), PipelineState::Indexing);

        let state = backend.state.lock().unwrap();
        let (created, body) = &state.created[0];
        assert_eq!(created, &index);
        assert_eq!(body["settings"]["index"]["refresh_interval"], "-1");
        assert_eq!(body["settings"]["index"]["number_of_replicas"], 0);
        assert_eq!(body["mappings"]["properties"]["message"]["type"], "text");
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let backend = Arc::new(MockBackend::new());
        let mut indexer = BulkIndexer::new(backend, "syslog", Value::Null, config()).unwrap();
        indexer.start().await.unwrap();
        assert!(indexer.start().await.is_err());
    }

    #[tokio::test]
    async fn create_failure_moves_to_failed() {
        let backend = Arc::new(MockBackend::new());
        backend.fail("create_index");
        let mut indexer = BulkIndexer::new(backend, "syslog", Value::Null, config()).unwrap();
        assert!(indexer.start().await.is_err());
        assert_eq!(indexer.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn end_refreshes_merges_and_swaps_alias() {
        let backend = Arc::new(MockBackend::new());
        backend.bind_alias("syslog", &["syslog-20240101000000000"]);
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config()).unwrap();
        let index = indexer.start().await.unwrap().to_owned();

        let receipts: Vec<_> = (0..25)
            .map(|i| indexer.push(&doc(i), Some(format!("r-{i:03}").as_str()), None).unwrap())
            .collect();
        let summary = indexer.end().await.unwrap();
        for receipt in receipts {
            assert_eq!(receipt.await, Ok(()));
        }

        assert_eq!(indexer.state(), PipelineState::Done);
        assert_eq!(summary.index, index);
        assert_eq!(summary.pushed, 25);
        assert_eq!(summary.indexed, 25);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.replaced, vec!["syslog-20240101000000000".to_owned()]);

        let state = backend.state.lock().unwrap();
        assert_eq!(state.refreshed, vec![index.clone()]);
        assert_eq!(state.merged, vec![(index.clone(), 1)]);
        assert_eq!(state.alias_updates.len(), 1);
        assert_eq!(
            state.alias_updates[0],
            vec![
                AliasAction::Add {
                    index: index.clone(),
                    alias: "syslog".to_owned()
                },
                AliasAction::Remove {
                    index: "syslog-20240101000000000".to_owned(),
                    alias: "syslog".to_owned()
                },
            ]
        );
        assert_eq!(state.aliases["syslog"], vec![index]);
    }

    #[tokio::test]
    async fn round_robin_preserves_order_within_worker() {
        let backend = Arc::new(MockBackend::new());
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config()).unwrap();
        indexer.start().await.unwrap();
        for i in 0..10 {
            indexer.push(&doc(i), Some(i.to_string().as_str()), None).unwrap();
        }
        indexer.end().await.unwrap();

        let state = backend.state.lock().unwrap();
        let mut ids: Vec<Vec<u32>> = state
            .bulk_calls
            .iter()
            .map(|call| {
                call.iter()
                    .map(|item| item.action.id.as_deref().unwrap().parse().unwrap())
                    .collect()
            })
            .collect();
        ids.sort();
        assert_eq!(ids, vec![vec![0, 2, 4, 6, 8], vec![1, 3, 5, 7, 9]]);
    }

    #[tokio::test(start_paused = true)]
    async fn per_item_outcomes_resolve_individually() {
        // 첫 호출: 0번 성공, 1번 과부하, 2번 거부. 이후 호출은 모두 성공.
        let backend = Arc::new(MockBackend::with_bulk_responder(|call, items| {
            let items = if call == 0 {
                vec![
                    ItemStatus::Ok,
                    ItemStatus::Throttled { status: 429 },
                    ItemStatus::Failed {
                        status: 400,
                        reason: "mapper_parsing_exception".to_owned(),
                    },
                ]
            } else {
                vec![ItemStatus::Ok; items.len()]
            };
            Ok(BulkResponse { items })
        }));
        let config = BulkConfig::builder()
            .workers(1)
            .batch_bytes(1_024)
            .build()
            .unwrap();
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config).unwrap();
        indexer.start().await.unwrap();
        let receipts: Vec<_> = (0..3)
            .map(|i| indexer.push(&doc(i), None, None).unwrap())
            .collect();
        let summary = indexer.end().await.unwrap();

        let mut results = Vec::new();
        for receipt in receipts {
            results.push(receipt.await);
        }
        assert_eq!(results[0], Ok(()));
        assert_eq!(results[1], Ok(()));
        assert!(matches!(
            results[2],
            Err(ItemError::Rejected { status: 400, .. })
        ));
        assert_eq!(summary.indexed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.retried, 1);

        let state = backend.state.lock().unwrap();
        assert_eq!(state.bulk_calls.len(), 2);
        assert_eq!(state.bulk_calls[1].len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_retry_fails_exhausted_items() {
        let backend = Arc::new(MockBackend::with_bulk_responder(|_, _| {
            Err(BackendError::Throttled { status: 503 })
        }));
        let config = BulkConfig::builder()
            .workers(1)
            .retry_max_attempts(3)
            .build()
            .unwrap();
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config).unwrap();
        indexer.start().await.unwrap();
        let receipt = indexer.push(&doc(0), None, None).unwrap();
        let summary = indexer.end().await.unwrap();

        assert_eq!(receipt.await, Err(ItemError::Throttled { attempts: 3 }));
        assert_eq!(backend.bulk_call_count(), 3);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn transport_failure_fails_whole_batch() {
        let backend = Arc::new(MockBackend::new());
        backend.fail("bulk");
        let config = BulkConfig::builder().workers(1).build().unwrap();
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config).unwrap();
        indexer.start().await.unwrap();
        let receipts: Vec<_> = (0..4)
            .map(|i| indexer.push(&doc(i), None, None).unwrap())
            .collect();
        let summary = indexer.end().await.unwrap();

        for receipt in receipts {
            assert!(matches!(receipt.await, Err(ItemError::Transport(_))));
        }
        assert_eq!(summary.failed, 4);
        assert_eq!(summary.indexed, 0);
    }

    #[tokio::test]
    async fn mismatched_response_length_fails_batch() {
        let backend = Arc::new(MockBackend::with_bulk_responder(|_, _| {
            Ok(BulkResponse {
                items: vec![ItemStatus::Ok],
            })
        }));
        let config = BulkConfig::builder().workers(1).build().unwrap();
        let mut indexer = BulkIndexer::new(backend, "syslog", Value::Null, config).unwrap();
        indexer.start().await.unwrap();
        let a = indexer.push(&doc(0), None, None).unwrap();
        let b = indexer.push(&doc(1), None, None).unwrap();
        indexer.end().await.unwrap();
        assert!(matches!(a.await, Err(ItemError::Transport(_))));
        assert!(matches!(b.await, Err(ItemError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_partial_batch_flushes_after_interval() {
        let backend = Arc::new(MockBackend::new());
        let config = BulkConfig::builder()
            .workers(1)
            .flush_interval(Duration::from_millis(200))
            .build()
            .unwrap();
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config).unwrap();
        indexer.start().await.unwrap();
        let receipt = indexer.push(&doc(0), None, None).unwrap();

        // 임계치에 못 미친 배치도 유휴 간격 후 전송됨
        receipt.await.unwrap();
        assert_eq!(backend.bulk_call_count(), 1);
        indexer.end().await.unwrap();
    }

    #[tokio::test]
    async fn merge_failure_leaves_alias_untouched() {
        let backend = Arc::new(MockBackend::new());
        backend.bind_alias("syslog", &["syslog-old"]);
        backend.fail("force_merge");
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config()).unwrap();
        indexer.start().await.unwrap();
        assert!(indexer.end().await.is_err());
        assert_eq!(indexer.state(), PipelineState::Failed);

        let state = backend.state.lock().unwrap();
        assert!(state.alias_updates.is_empty());
        assert_eq!(state.aliases["syslog"], vec!["syslog-old".to_owned()]);
    }

    #[tokio::test]
    async fn push_document_rejects_finder_without_permalink() {
        let backend = Arc::new(MockBackend::new());
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config()).unwrap();
        indexer.start().await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();

        let err = indexer
            .push_document(&LogDocument::new(now, now, "dc01.corp.example-4624-77"))
            .unwrap_err();
        assert!(matches!(err, IndexerError::Validation(_)));
        assert_eq!(indexer.pushed(), 0);

        indexer.end().await.unwrap();
        assert_eq!(backend.bulk_call_count(), 0);
    }

    #[tokio::test]
    async fn abort_deletes_unaliased_generation() {
        let backend = Arc::new(MockBackend::new());
        backend.bind_alias("syslog", &["syslog-old"]);
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config()).unwrap();
        let index = indexer.start().await.unwrap().to_owned();
        let receipt = indexer.push(&doc(0), None, None).unwrap();

        indexer.abort().await.unwrap();
        assert_eq!(indexer.state(), PipelineState::Failed);
        assert!(indexer.push(&doc(1), None, None).is_err());
        assert!(receipt.await.is_err());

        let state = backend.state.lock().unwrap();
        assert_eq!(state.deleted, vec![index]);
        assert!(state.alias_updates.is_empty());
        assert_eq!(state.aliases["syslog"], vec!["syslog-old".to_owned()]);
    }

    #[tokio::test]
    async fn abort_before_start_is_invalid_state() {
        let backend = Arc::new(MockBackend::new());
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config()).unwrap();
        assert!(indexer.abort().await.is_err());
        assert!(backend.state.lock().unwrap().deleted.is_empty());
    }

    #[tokio::test]
    async fn push_document_uses_record_finder_as_id() {
        let backend = Arc::new(MockBackend::new());
        let mut indexer =
            BulkIndexer::new(Arc::clone(&backend), "syslog", Value::Null, config()).unwrap();
        indexer.start().await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let receipt = indexer
            .push_document(&LogDocument::new(now, now, "rf-1"))
            .unwrap();
        indexer.end().await.unwrap();
        receipt.await.unwrap();

        let state = backend.state.lock().unwrap();
        assert_eq!(state.bulk_calls[0][0].action.id.as_deref(), Some("rf-1"));
    }
}
