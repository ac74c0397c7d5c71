//! Scriptable in-memory backend for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use logsift_core::error::BackendError;
use serde_json::Value;

use super::{
    AliasAction, BulkItem, BulkResponse, ItemStatus, ScrollPage, SearchBackend, SearchResponse,
};

type BulkResponder =
    Box<dyn Fn(usize, &[BulkItem]) -> Result<BulkResponse, BackendError> + Send + Sync>;

#[derive(Default)]
pub(crate) struct MockState {
    pub bulk_calls: Vec<Vec<BulkItem>>,
    pub created: Vec<(String, Value)>,
    pub deleted: Vec<String>,
    pub refreshed: Vec<String>,
    pub merged: Vec<(String, u32)>,
    pub aliases: HashMap<String, Vec<String>>,
    pub alias_updates: Vec<Vec<AliasAction>>,
    pub searches: Vec<(String, Value)>,
    pub search_response: SearchResponse,
    pub scroll_opens: Vec<(String, Value, String)>,
    pub scroll_pages: VecDeque<ScrollPage>,
    pub scroll_continues: Vec<String>,
    pub cleared: Vec<String>,
    /// Operations that fail with a transport error
    pub failing: HashSet<&'static str>,
}

pub(crate) struct MockBackend {
    pub state: Mutex<MockState>,
    responder: Option<BulkResponder>,
}

impl MockBackend {
    /// Accepts every bulk item.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            responder: None,
        }
    }

    /// Answers bulk call `n` (0-based) with the given closure.
    pub fn with_bulk_responder(
        responder: impl Fn(usize, &[BulkItem]) -> Result<BulkResponse, BackendError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            responder: Some(Box::new(responder)),
        }
    }

    pub fn fail(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.insert(operation);
    }

    pub fn bind_alias(&self, alias: &str, indices: &[&str]) {
        self.state.lock().unwrap().aliases.insert(
            alias.to_owned(),
            indices.iter().map(|s| (*s).to_owned()).collect(),
        );
    }

    pub fn set_search_response(&self, response: SearchResponse) {
        self.state.lock().unwrap().search_response = response;
    }

    pub fn push_scroll_page(&self, page: ScrollPage) {
        self.state.lock().unwrap().scroll_pages.push_back(page);
    }

    pub fn bulk_call_count(&self) -> usize {
        self.state.lock().unwrap().bulk_calls.len()
    }

    fn check(&self, operation: &'static str) -> Result<(), BackendError> {
        if self.state.lock().unwrap().failing.contains(operation) {
            return Err(BackendError::Transport(format!("{operation}: connection refused")));
        }
        Ok(())
    }

    fn next_scroll_page(&self) -> ScrollPage {
        self.state
            .lock()
            .unwrap()
            .scroll_pages
            .pop_front()
            .unwrap_or_default()
    }
}

impl SearchBackend for MockBackend {
    async fn bulk(&self, items: &[BulkItem]) -> Result<BulkResponse, BackendError> {
        self.check("bulk")?;
        let call = {
            let mut state = self.state.lock().unwrap();
            state.bulk_calls.push(items.to_vec());
            state.bulk_calls.len() - 1
        };
        match &self.responder {
            Some(responder) => responder(call, items),
            None => Ok(BulkResponse {
                items: vec![ItemStatus::Ok; items.len()],
            }),
        }
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse, BackendError> {
        self.check("search")?;
        let mut state = self.state.lock().unwrap();
        state.searches.push((index.to_owned(), body.clone()));
        Ok(state.search_response.clone())
    }

    async fn open_scroll(
        &self,
        index: &str,
        body: &Value,
        keep_alive: &str,
    ) -> Result<ScrollPage, BackendError> {
        self.check("open_scroll")?;
        self.state.lock().unwrap().scroll_opens.push((
            index.to_owned(),
            body.clone(),
            keep_alive.to_owned(),
        ));
        Ok(self.next_scroll_page())
    }

    async fn continue_scroll(
        &self,
        scroll_id: &str,
        _keep_alive: &str,
    ) -> Result<ScrollPage, BackendError> {
        self.check("continue_scroll")?;
        self.state
            .lock()
            .unwrap()
            .scroll_continues
            .push(scroll_id.to_owned());
        Ok(self.next_scroll_page())
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), BackendError> {
        self.check("clear_scroll")?;
        self.state.lock().unwrap().cleared.push(scroll_id.to_owned());
        Ok(())
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), BackendError> {
        self.check("create_index")?;
        self.state
            .lock()
            .unwrap()
            .created
            .push((index.to_owned(), body.clone()));
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), BackendError> {
        self.check("delete_index")?;
        self.state.lock().unwrap().deleted.push(index.to_owned());
        Ok(())
    }

    async fn refresh(&self, index: &str) -> Result<(), BackendError> {
        self.check("refresh")?;
        self.state.lock().unwrap().refreshed.push(index.to_owned());
        Ok(())
    }

    async fn force_merge(
        &self,
        index: &str,
        max_segments: u32,
        _timeout: Duration,
    ) -> Result<(), BackendError> {
        self.check("force_merge")?;
        self.state
            .lock()
            .unwrap()
            .merged
            .push((index.to_owned(), max_segments));
        Ok(())
    }

    async fn get_alias(&self, alias: &str) -> Result<Vec<String>, BackendError> {
        self.check("get_alias")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .aliases
            .get(alias)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), BackendError> {
        self.check("update_aliases")?;
        let mut state = self.state.lock().unwrap();
        state.alias_updates.push(actions.to_vec());
        for action in actions {
            match action {
                AliasAction::Add { index, alias } => {
                    state
                        .aliases
                        .entry(alias.clone())
                        .or_default()
                        .push(index.clone());
                }
                AliasAction::Remove { index, alias } => {
                    if let Some(bound) = state.aliases.get_mut(alias) {
                        bound.retain(|i| i != index);
                    }
                }
            }
        }
        Ok(())
    }
}
