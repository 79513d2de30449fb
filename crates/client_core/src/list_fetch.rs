//! Loading, error and pagination state for list views.
//!
//! A [`ListFetchController`] drives one filtered collection: the first page
//! for a parameter set, then further pages on demand. Every `load`, `reload`
//! and `set_params` starts a new generation; responses tagged with an older
//! generation are dropped when they resolve, so a slow reply for stale
//! parameters can never overwrite a newer list.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::error::ClientError;

/// One batch of items plus what the server said about the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            has_more: false,
        }
    }

    /// Cuts one page out of a collection the backend returns whole.
    pub fn from_slice(all: Vec<T>, offset: usize, limit: usize) -> Self {
        let total = all.len();
        let items: Vec<T> = all.into_iter().skip(offset).take(limit).collect();
        let has_more = offset.saturating_add(items.len()) < total;
        Self {
            items,
            total: total as u64,
            has_more,
        }
    }
}

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Filter criteria. Two parameter sets that compare equal are the same query.
    type Params: Clone + PartialEq + Debug + Send + Sync;
    type Item: Clone + Send + Sync;

    async fn fetch_page(
        &self,
        params: &Self::Params,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Self::Item>, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Each page replaces the visible items (numbered pagination).
    #[default]
    Replace,
    /// Each page is appended to the visible items (infinite scroll).
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub status: Option<u16>,
    reauth: bool,
}

impl ErrorInfo {
    /// The session is missing or was rejected; the view should send the
    /// user back to login.
    pub fn requires_reauth(&self) -> bool {
        self.reauth
    }
}

impl From<&ClientError> for ErrorInfo {
    fn from(err: &ClientError) -> Self {
        Self {
            message: err.to_string(),
            status: err.status(),
            reauth: err.requires_reauth(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Loading,
    LoadingMore,
    Loaded,
    Errored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub loading_more: bool,
    pub error: Option<ErrorInfo>,
    /// Items fetched so far under the current parameters.
    pub offset: usize,
    pub has_more: bool,
    /// Last total reported by the server; `None` until a page has landed.
    pub total: Option<u64>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            loading_more: false,
            error: None,
            offset: 0,
            has_more: true,
            total: None,
        }
    }
}

impl<T> FetchState<T> {
    pub fn phase(&self) -> FetchPhase {
        if self.loading {
            FetchPhase::Loading
        } else if self.loading_more {
            FetchPhase::LoadingMore
        } else if self.error.is_some() {
            FetchPhase::Errored
        } else if self.total.is_some() {
            FetchPhase::Loaded
        } else {
            FetchPhase::Idle
        }
    }

    /// 1-based page number of the items currently shown in replace mode.
    pub fn current_page(&self, page_size: usize) -> usize {
        let page_size = page_size.max(1);
        self.offset.div_ceil(page_size).max(1)
    }

    pub fn total_pages(&self, page_size: usize) -> Option<u64> {
        let page_size = page_size.max(1) as u64;
        self.total.map(|total| total.div_ceil(page_size))
    }
}

/// What a command did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page landed and was applied.
    Applied,
    /// The fetch failed; the error is recorded in the state.
    Failed,
    /// A newer generation started while this fetch was in flight.
    Stale,
    /// Guarded no-op: nothing was fetched.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    First,
    Next,
}

struct ControllerInner<P, T> {
    generation: u64,
    params: Option<P>,
    state: FetchState<T>,
}

pub struct ListFetchController<S: PageSource> {
    source: Arc<S>,
    mode: FetchMode,
    page_size: usize,
    inner: Mutex<ControllerInner<S::Params, S::Item>>,
    updates: watch::Sender<FetchState<S::Item>>,
}

impl<S: PageSource> ListFetchController<S> {
    pub fn new(source: Arc<S>, mode: FetchMode, page_size: usize) -> Self {
        let (updates, _) = watch::channel(FetchState::default());
        Self {
            source,
            mode,
            page_size: page_size.max(1),
            inner: Mutex::new(ControllerInner {
                generation: 0,
                params: None,
                state: FetchState::default(),
            }),
            updates,
        }
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Snapshot of the latest state.
    pub fn state(&self) -> FetchState<S::Item> {
        self.updates.borrow().clone()
    }

    /// Observes every state transition, including the loading flags.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<S::Item>> {
        self.updates.subscribe()
    }

    pub async fn params(&self) -> Option<S::Params> {
        self.inner.lock().await.params.clone()
    }

    /// Starts over with `params` and fetches the first page.
    pub async fn load(&self, params: S::Params) -> FetchOutcome {
        let generation = {
            let mut guard = self.inner.lock().await;
            self.begin_load(&mut guard, params.clone())
        };
        self.fetch_first(generation, params).await
    }

    /// Like [`load`](Self::load), but only when `params` differ from the current ones.
    pub async fn set_params(&self, params: S::Params) -> FetchOutcome {
        let generation = {
            let mut guard = self.inner.lock().await;
            if guard.params.as_ref() == Some(&params) {
                debug!(?params, "params unchanged; skipping fetch");
                return FetchOutcome::Skipped;
            }
            self.begin_load(&mut guard, params.clone())
        };
        self.fetch_first(generation, params).await
    }

    /// Refetches the first page for the current params. The items already on
    /// screen stay visible until the new page lands.
    pub async fn reload(&self) -> FetchOutcome {
        let (generation, params) = {
            let mut guard = self.inner.lock().await;
            let Some(params) = guard.params.clone() else {
                return FetchOutcome::Skipped;
            };
            guard.generation += 1;
            guard.state.loading = true;
            guard.state.loading_more = false;
            self.publish(&guard.state);
            (guard.generation, params)
        };
        debug!(generation, ?params, "reloading list");
        self.fetch_first(generation, params).await
    }

    /// Fetches the page after `offset`. No-op while another fetch is
    /// outstanding or once the list is exhausted.
    pub async fn load_more(&self) -> FetchOutcome {
        let (generation, params, offset) = {
            let mut guard = self.inner.lock().await;
            let state = &guard.state;
            if state.loading || state.loading_more || !state.has_more {
                return FetchOutcome::Skipped;
            }
            let Some(params) = guard.params.clone() else {
                return FetchOutcome::Skipped;
            };
            guard.state.loading_more = true;
            self.publish(&guard.state);
            (guard.generation, params, guard.state.offset)
        };
        debug!(generation, offset, limit = self.page_size, "loading next page");
        let result = self
            .source
            .fetch_page(&params, offset, self.page_size)
            .await;
        self.apply(generation, Request::Next, result).await
    }

    fn begin_load(
        &self,
        guard: &mut ControllerInner<S::Params, S::Item>,
        params: S::Params,
    ) -> u64 {
        guard.generation += 1;
        debug!(generation = guard.generation, ?params, "loading list");
        guard.params = Some(params);
        let state = &mut guard.state;
        state.items.clear();
        state.offset = 0;
        state.has_more = true;
        state.total = None;
        state.loading = true;
        state.loading_more = false;
        self.publish(&guard.state);
        guard.generation
    }

    async fn fetch_first(&self, generation: u64, params: S::Params) -> FetchOutcome {
        let result = self.source.fetch_page(&params, 0, self.page_size).await;
        self.apply(generation, Request::First, result).await
    }

    async fn apply(
        &self,
        generation: u64,
        request: Request,
        result: Result<Page<S::Item>, ClientError>,
    ) -> FetchOutcome {
        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            debug!(
                generation,
                current = guard.generation,
                "dropping response for superseded generation"
            );
            return FetchOutcome::Stale;
        }

        let state = &mut guard.state;
        state.loading = false;
        state.loading_more = false;

        let outcome = match result {
            Ok(page) => {
                let received = page.items.len();
                state.has_more = page.has_more && received >= self.page_size;
                state.total = Some(page.total);
                state.error = None;
                match (request, self.mode) {
                    (Request::Next, FetchMode::Append) => state.items.extend(page.items),
                    _ => state.items = page.items,
                }
                state.offset = match request {
                    Request::First => received,
                    Request::Next => state.offset + received,
                };
                debug!(
                    generation,
                    received,
                    offset = state.offset,
                    has_more = state.has_more,
                    "page applied"
                );
                FetchOutcome::Applied
            }
            Err(err) => {
                warn!(generation, error = %err, "page fetch failed");
                state.error = Some(ErrorInfo::from(&err));
                FetchOutcome::Failed
            }
        };

        self.publish(&guard.state);
        outcome
    }

    fn publish(&self, state: &FetchState<S::Item>) {
        self.updates.send_replace(state.clone());
    }
}

#[cfg(test)]
#[path = "tests/list_fetch_tests.rs"]
mod tests;
