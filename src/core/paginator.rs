use crate::core::resilient_call::ResilientCall;
use crate::domain::model::{CallOutcome, Page};
use crate::domain::ports::{PageFetcher, ResourcePath};
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 分頁走訪器：每一頁都經過斷路器，失敗即視同空頁停止
pub struct Paginator<F> {
    fetcher: Arc<F>,
    resilient: ResilientCall,
    breaker_key: String,
}

impl<F> Clone for Paginator<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            resilient: self.resilient.clone(),
            breaker_key: self.breaker_key.clone(),
        }
    }
}

impl<F> Paginator<F> {
    pub fn new(fetcher: Arc<F>, resilient: ResilientCall, breaker_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            resilient,
            breaker_key: breaker_key.into(),
        }
    }

    /// Starts a lazy traversal. Nothing is fetched until the cursor is polled.
    pub fn paginate<T>(
        &self,
        service_name: &str,
        resource: ResourcePath,
        max_pages: usize,
        cancel: CancellationToken,
    ) -> PageCursor<T, F>
    where
        F: PageFetcher<T>,
    {
        PageCursor {
            paginator: self.clone(),
            service_name: service_name.to_string(),
            resource,
            max_pages,
            cancel,
            next_page: 0,
            buffer: VecDeque::new(),
            finished: false,
            _item: PhantomData,
        }
    }
}

pub struct PageCursor<T, F> {
    paginator: Paginator<F>,
    service_name: String,
    resource: ResourcePath,
    max_pages: usize,
    cancel: CancellationToken,
    next_page: usize,
    buffer: VecDeque<T>,
    finished: bool,
    _item: PhantomData<fn() -> T>,
}

impl<T, F> PageCursor<T, F>
where
    F: PageFetcher<T>,
{
    pub async fn next(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            self.fetch_next_page().await;
        }
    }

    pub async fn collect_all(mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item);
        }
        items
    }

    pub fn pages_fetched(&self) -> usize {
        self.next_page
    }

    async fn fetch_next_page(&mut self) {
        if self.cancel.is_cancelled() {
            tracing::debug!(resource = %self.resource, "pagination cancelled");
            self.finished = true;
            return;
        }
        if self.next_page >= self.max_pages {
            tracing::debug!(
                resource = %self.resource,
                max_pages = self.max_pages,
                "page cap reached, stopping pagination"
            );
            self.finished = true;
            return;
        }

        let page_index = self.next_page;
        self.next_page += 1;

        let fetcher = &self.paginator.fetcher;
        let service_name = self.service_name.as_str();
        let resource = &self.resource;
        let outcome = self
            .paginator
            .resilient
            .invoke(
                &self.paginator.breaker_key,
                &self.cancel,
                Some(Page::empty(page_index)),
                || fetcher.fetch_page(service_name, resource, page_index),
            )
            .await;

        match outcome {
            CallOutcome::Success(page) => {
                tracing::debug!(
                    resource = %self.resource,
                    page = page_index,
                    items = page.items.len(),
                    "fetched page"
                );
                if page.is_last() {
                    self.finished = true;
                }
                self.buffer.extend(page.items);
            }
            other => {
                // 不猜測缺漏的資料，保留先前已取得的項目
                tracing::debug!(
                    resource = %self.resource,
                    page = page_index,
                    kind = ?other.failure_kind(),
                    "page fetch did not succeed, stopping pagination"
                );
                self.finished = true;
            }
        }
    }
}
