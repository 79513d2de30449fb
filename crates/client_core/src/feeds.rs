//! [`PageSource`] implementations for each list view of the dashboard.
//!
//! News is paginated by the backend. Search only honours a limit, and the
//! scheduler, sources and payments endpoints return whole collections, so
//! those feeds page on the client.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use shared::{
    domain::{SortOrder, SourceId},
    protocol::{Article, Payment, ScheduledTask, Source},
};

use crate::{
    error::ClientError,
    list_fetch::{Page, PageSource},
    DashboardClient,
};

/// Filters for the saved-news listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewsQuery {
    #[serde(rename = "fuente_id", skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SourceId>,
    #[serde(rename = "categoria", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    #[serde(rename = "q", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "fuente_id", skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SourceId>,
    #[serde(rename = "fecha_desde", skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(rename = "fecha_hasta", skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(rename = "orden")]
    pub order: SortOrder,
}

impl SearchQuery {
    pub fn validate(&self) -> Result<(), ClientError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(ClientError::InvalidInput(format!(
                    "date range starts after it ends ({from} > {to})"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceFilter {
    pub active_only: bool,
}

pub struct NewsFeed {
    client: Arc<DashboardClient>,
}

impl NewsFeed {
    pub fn new(client: Arc<DashboardClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for NewsFeed {
    type Params = NewsQuery;
    type Item = Article;

    async fn fetch_page(
        &self,
        params: &NewsQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Article>, ClientError> {
        let response = self.client.list_news(params, offset, limit).await?;
        let has_more = (offset + response.articles.len()) < response.total as usize;
        Ok(Page {
            items: response.articles,
            total: response.total,
            has_more,
        })
    }
}

pub struct SearchFeed {
    client: Arc<DashboardClient>,
}

impl SearchFeed {
    pub fn new(client: Arc<DashboardClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for SearchFeed {
    type Params = SearchQuery;
    type Item = Article;

    async fn fetch_page(
        &self,
        params: &SearchQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Article>, ClientError> {
        let wanted = offset.saturating_add(limit);
        let requested = u32::try_from(wanted).unwrap_or(u32::MAX);
        let response = self.client.search_news(params, requested).await?;
        let received = response.results.len();
        let items: Vec<Article> = response.results.into_iter().skip(offset).collect();
        Ok(Page {
            items,
            total: received as u64,
            has_more: received >= wanted,
        })
    }
}

pub struct TaskFeed {
    client: Arc<DashboardClient>,
}

impl TaskFeed {
    pub fn new(client: Arc<DashboardClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for TaskFeed {
    type Params = ();
    type Item = ScheduledTask;

    async fn fetch_page(
        &self,
        _params: &(),
        offset: usize,
        limit: usize,
    ) -> Result<Page<ScheduledTask>, ClientError> {
        let tasks = self.client.list_tasks().await?;
        Ok(Page::from_slice(tasks, offset, limit))
    }
}

pub struct SourceFeed {
    client: Arc<DashboardClient>,
}

impl SourceFeed {
    pub fn new(client: Arc<DashboardClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for SourceFeed {
    type Params = SourceFilter;
    type Item = Source;

    async fn fetch_page(
        &self,
        params: &SourceFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Source>, ClientError> {
        let sources = self.client.list_sources(params.active_only).await?;
        Ok(Page::from_slice(sources, offset, limit))
    }
}

/// Payments awaiting an admin's approval.
pub struct PendingPaymentFeed {
    client: Arc<DashboardClient>,
}

impl PendingPaymentFeed {
    pub fn new(client: Arc<DashboardClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for PendingPaymentFeed {
    type Params = ();
    type Item = Payment;

    async fn fetch_page(
        &self,
        _params: &(),
        offset: usize,
        limit: usize,
    ) -> Result<Page<Payment>, ClientError> {
        let payments = self.client.pending_payments().await?;
        Ok(Page::from_slice(payments, offset, limit))
    }
}

/// The signed-in user's own payments.
pub struct PaymentHistoryFeed {
    client: Arc<DashboardClient>,
}

impl PaymentHistoryFeed {
    pub fn new(client: Arc<DashboardClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for PaymentHistoryFeed {
    type Params = ();
    type Item = Payment;

    async fn fetch_page(
        &self,
        _params: &(),
        offset: usize,
        limit: usize,
    ) -> Result<Page<Payment>, ClientError> {
        let payments = self.client.my_payments().await?;
        Ok(Page::from_slice(payments, offset, limit))
    }
}

#[cfg(test)]
#[path = "tests/feeds_tests.rs"]
mod tests;
