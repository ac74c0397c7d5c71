//! scroll 커서 소비자 -- 전체 결과 집합을 페이지 단위로 끌어옵니다.
//!
//! 첫 [`next_page`](ScrollConsumer::next_page) 호출이 커서를 열고, 이후 호출은 커서를
//! 갱신하며 다음 페이지를 가져옵니다. 누적 개수가 보고된 총합에 도달하거나 빈 페이지가
//! 오면 끝나며, 끝난 소비자는 다시 시작할 수 없습니다.
//!
//! 서버 쪽 커서는 정상 종료, pull 실패, 소비자 drop 중 어느 경우에도 해제됩니다.

use std::sync::Arc;

use logsift_core::error::ValidationError;
use logsift_core::metrics as m;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{RawHit, ScrollPage, SearchBackend};
use crate::error::IndexerError;

/// scroll 커서 소비자
pub struct ScrollConsumer<B: SearchBackend> {
    backend: Arc<B>,
    index: String,
    body: Value,
    keep_alive: String,
    scroll_id: Option<String>,
    opened: bool,
    exhausted: bool,
    in_flight: bool,
    total: Option<u64>,
    fetched: u64,
}

impl<B: SearchBackend> ScrollConsumer<B> {
    /// 소비자를 생성합니다. 커서는 첫 `next_page` 호출에서 열립니다.
    ///
    /// `keep_alive`는 커서 임대 기간입니다 (예: `"1m"`).
    pub fn new(
        backend: Arc<B>,
        index: impl Into<String>,
        body: Value,
        keep_alive: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            index: index.into(),
            body,
            keep_alive: keep_alive.into(),
            scroll_id: None,
            opened: false,
            exhausted: false,
            in_flight: false,
            total: None,
            fetched: 0,
        }
    }

    /// 다음 페이지를 가져옵니다. 끝나면 `None`을 반환합니다.
    ///
    /// # Errors
    ///
    /// 이전 호출의 future가 완료 전에 버려졌으면 `ScrollBusy`를 반환합니다.
    /// 이 경우 소비자는 더 이상 사용할 수 없습니다.
    /// 백엔드 호출이 실패하면 커서를 해제하고 에러를 그대로 반환하며,
    /// 이후 호출은 `None`을 반환합니다.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawHit>>, IndexerError> {
        if self.in_flight {
            return Err(ValidationError::ScrollBusy(self.index.clone()).into());
        }
        if self.exhausted {
            return Ok(None);
        }

        self.in_flight = true;
        let result = self.pull().await;
        if let Err(e) = &result {
            warn!(index = %self.index, fetched = self.fetched, error = %e, "scroll pull failed");
            self.finish().await;
        }
        self.in_flight = false;
        result
    }

    /// 백엔드가 보고한 총 일치 건수 (첫 페이지 이후)
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// 지금까지 받은 hit 수
    pub fn fetched(&self) -> u64 {
        self.fetched
    }

    /// 끝났는지 확인합니다.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    async fn pull(&mut self) -> Result<Option<Vec<RawHit>>, IndexerError> {
        let page = match (&self.scroll_id, self.opened) {
            (_, false) => {
                let page = self
                    .backend
                    .open_scroll(&self.index, &self.body, &self.keep_alive)
                    .await?;
                self.opened = true;
                debug!(index = %self.index, total = page.total, "scroll opened");
                page
            }
            (Some(id), true) => self.backend.continue_scroll(id, &self.keep_alive).await?,
            (None, true) => {
                // 백엔드가 커서를 돌려주지 않으면 더 가져올 수 없음
                self.exhausted = true;
                return Ok(None);
            }
        };

        let ScrollPage {
            scroll_id,
            total,
            hits,
        } = page;
        if scroll_id.is_some() {
            self.scroll_id = scroll_id;
        }
        self.total = Some(total);
        metrics::counter!(m::SCROLL_PAGES_TOTAL).increment(1);

        if hits.is_empty() {
            self.finish().await;
            return Ok(None);
        }

        self.fetched += hits.len() as u64;
        if self.fetched >= total {
            self.finish().await;
        }
        Ok(Some(hits))
    }

    /// 소비를 끝내고 커서를 해제합니다. 해제 실패는 기록만 합니다.
    async fn finish(&mut self) {
        self.exhausted = true;
        debug!(index = %self.index, fetched = self.fetched, "scroll exhausted");
        if let Some(id) = self.scroll_id.take() {
            if let Err(e) = self.backend.clear_scroll(&id).await {
                warn!(index = %self.index, error = %e, "failed to clear scroll cursor");
            }
        }
    }
}

impl<B: SearchBackend> Drop for ScrollConsumer<B> {
    fn drop(&mut self) {
        let Some(id) = self.scroll_id.take() else {
            return;
        };
        // 런타임 밖에서 drop되면 커서는 keep-alive 만료로 정리됨
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        let index = std::mem::take(&mut self.index);
        handle.spawn(async move {
            if let Err(e) = backend.clear_scroll(&id).await {
                warn!(index = %index, error = %e, "failed to clear abandoned scroll cursor");
            }
        });
    }
}
