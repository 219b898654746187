//! Cursor-driven traversal of a paginated issue or pull request collection.

use std::collections::VecDeque;

use futures::Stream;
use tracing::{debug, info};

use super::error::ForgeError;
use super::types::{ItemKind, PageRequest, Record};
use super::PageSource;
use crate::input::{ExcludedAuthors, LabelPredicate, RepoRef};

/// Limits for one traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerOptions {
    pub kind: ItemKind,
    pub page_size: u32,
    /// Maximum number of pages to request.
    pub page_limit: Option<u32>,
    /// Maximum number of records to yield. Excluded authors do not count.
    pub item_limit: Option<usize>,
}

/// A yielded record and the first of its labels satisfying the predicate.
pub type Matched = (Record, Option<String>);

/// Lazily walks a collection page by page. The cursor only moves forward, so
/// no page is requested twice.
pub struct PagedFetcher<'a, S> {
    source: &'a S,
    repo: RepoRef,
    options: PagerOptions,
    predicate: &'a LabelPredicate,
    excluded: &'a ExcludedAuthors,
    buffered: VecDeque<Record>,
    cursor: Option<String>,
    has_next_page: bool,
    pages_fetched: u32,
    yielded: usize,
    done: bool,
}

impl<'a, S: PageSource> PagedFetcher<'a, S> {
    pub fn new(
        source: &'a S,
        repo: RepoRef,
        options: PagerOptions,
        predicate: &'a LabelPredicate,
        excluded: &'a ExcludedAuthors,
    ) -> Self {
        Self {
            source,
            repo,
            options,
            predicate,
            excluded,
            buffered: VecDeque::new(),
            cursor: None,
            has_next_page: true,
            pages_fetched: 0,
            yielded: 0,
            done: false,
        }
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Next record, fetching another page when the current one is used up.
    ///
    /// `Ok(None)` means the traversal ended normally (no next page, page limit
    /// or item limit). A request that exhausts its retries ends the traversal
    /// with `Err`.
    pub async fn next_item(&mut self) -> Result<Option<Matched>, ForgeError> {
        while !self.done {
            let Some(record) = self.buffered.pop_front() else {
                self.fetch_next_page().await?;
                continue;
            };

            if let Some(login) = record.author.as_deref() {
                if self.excluded.contains(login) {
                    debug!(number = record.number, author = login, "author excluded");
                    continue;
                }
            }

            if self.options.item_limit.is_some_and(|limit| self.yielded >= limit) {
                self.finish();
                break;
            }

            self.yielded += 1;
            let matched = self.predicate.first_match(&record.labels).map(str::to_string);
            return Ok(Some((record, matched)));
        }
        Ok(None)
    }

    async fn fetch_next_page(&mut self) -> Result<(), ForgeError> {
        if !self.has_next_page
            || self
                .options
                .page_limit
                .is_some_and(|limit| self.pages_fetched >= limit)
        {
            self.finish();
            return Ok(());
        }

        info!(
            "Downloading {} page {} from {}{}",
            self.options.kind,
            self.pages_fetched + 1,
            self.repo,
            self.cursor
                .as_deref()
                .map(|c| format!(" (cursor: '{c}')"))
                .unwrap_or_default()
        );

        let request = PageRequest {
            org: self.repo.org.clone(),
            repo: self.repo.repo.clone(),
            kind: self.options.kind,
            page_size: self.options.page_size,
            after: self.cursor.clone(),
        };
        let page = match self.source.fetch_page(&request).await {
            Ok(page) => page,
            Err(err) => {
                self.finish();
                return Err(err);
            }
        };

        self.pages_fetched += 1;
        self.has_next_page = page.has_next_page && page.end_cursor.is_some();
        self.cursor = page.end_cursor;
        self.buffered.extend(page.records);
        Ok(())
    }

    fn finish(&mut self) {
        self.done = true;
        self.buffered.clear();
        debug!(
            pages = self.pages_fetched,
            records = self.yielded,
            "traversal of {} finished",
            self.repo
        );
    }

    /// Adapts the traversal into a stream that ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Matched, ForgeError>> + 'a
    where
        S: 'a,
    {
        futures::stream::try_unfold(self, |mut pager| async move {
            Ok(pager.next_item().await?.map(|item| (item, pager)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::types::Page;
    use futures::TryStreamExt;
    use std::sync::Mutex;

    /// Serves `total` records in pages of the requested size; cursors are page indexes.
    struct FakeSource {
        total: u64,
        requests: Mutex<Vec<Option<String>>>,
        fail_on_page: Option<usize>,
        author_of: fn(u64) -> Option<String>,
        more_labels: fn(u64) -> bool,
    }

    impl FakeSource {
        fn new(total: u64) -> Self {
            Self {
                total,
                requests: Mutex::new(Vec::new()),
                fail_on_page: None,
                author_of: |_| Some("someone".into()),
                more_labels: |_| false,
            }
        }

        fn fetches(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl PageSource for FakeSource {
        async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ForgeError> {
            let index = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.after.clone());
                requests.len() - 1
            };
            if self.fail_on_page == Some(index) {
                return Err(ForgeError::Server {
                    status: 503,
                    message: "unavailable".into(),
                });
            }

            let start = request
                .after
                .as_deref()
                .map(|c| c.parse::<u64>().unwrap())
                .unwrap_or(0);
            let end = (start + request.page_size as u64).min(self.total);
            let records = (start..end)
                .map(|i| {
                    let number = i + 1;
                    Record {
                        kind: request.kind,
                        number,
                        title: format!("item {number}"),
                        body: String::new(),
                        author: (self.author_of)(number),
                        labels: if number % 2 == 0 {
                            vec!["bug".into(), format!("area-{number}")]
                        } else {
                            vec!["bug".into()]
                        },
                        has_more_labels: (self.more_labels)(number),
                        files: Vec::new(),
                        folders: Vec::new(),
                    }
                })
                .collect();

            Ok(Page {
                records,
                end_cursor: Some(end.to_string()),
                has_next_page: end < self.total,
            })
        }
    }

    fn options(page_size: u32, page_limit: Option<u32>, item_limit: Option<usize>) -> PagerOptions {
        PagerOptions {
            kind: ItemKind::Issue,
            page_size,
            page_limit,
            item_limit,
        }
    }

    fn predicate() -> LabelPredicate {
        "area-".parse().unwrap()
    }

    async fn collect(fetcher: PagedFetcher<'_, FakeSource>) -> Result<Vec<Matched>, ForgeError> {
        fetcher.into_stream().try_collect().await
    }

    #[tokio::test]
    async fn item_limit_truncates_third_page() {
        let source = FakeSource::new(5);
        let predicate = predicate();
        let excluded = ExcludedAuthors::default();
        let fetcher = PagedFetcher::new(
            &source,
            "org/repo".parse().unwrap(),
            options(2, None, Some(4)),
            &predicate,
            &excluded,
        );

        let items = collect(fetcher).await.unwrap();

        assert_eq!(items.len(), 4);
        assert_eq!(source.fetches(), 3);
        let numbers: Vec<u64> = items.iter().map(|(r, _)| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn cursor_advances_and_stops_without_next_page() {
        let source = FakeSource::new(5);
        let predicate = predicate();
        let excluded = ExcludedAuthors::default();
        let fetcher = PagedFetcher::new(
            &source,
            "org/repo".parse().unwrap(),
            options(2, None, None),
            &predicate,
            &excluded,
        );

        let items = collect(fetcher).await.unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(
            *source.requests.lock().unwrap(),
            vec![None, Some("2".to_string()), Some("4".to_string())]
        );
    }

    #[tokio::test]
    async fn page_limit_ends_traversal() {
        let source = FakeSource::new(10);
        let predicate = predicate();
        let excluded = ExcludedAuthors::default();
        let fetcher = PagedFetcher::new(
            &source,
            "org/repo".parse().unwrap(),
            options(3, Some(2), None),
            &predicate,
            &excluded,
        );

        let items = collect(fetcher).await.unwrap();

        assert_eq!(items.len(), 6);
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn matched_label_is_first_applicable() {
        let source = FakeSource::new(2);
        let predicate = predicate();
        let excluded = ExcludedAuthors::default();
        let fetcher = PagedFetcher::new(
            &source,
            "org/repo".parse().unwrap(),
            options(10, None, None),
            &predicate,
            &excluded,
        );

        let items = collect(fetcher).await.unwrap();

        assert_eq!(items[0].1, None);
        assert_eq!(items[1].1.as_deref(), Some("area-2"));
    }

    #[tokio::test]
    async fn excluded_authors_are_dropped_and_not_counted() {
        let mut source = FakeSource::new(6);
        source.author_of = |n| {
            Some(if n % 3 == 0 { "Dependabot[bot]" } else { "someone" }.to_string())
        };
        let predicate = predicate();
        let excluded: ExcludedAuthors = "dependabot[bot]".parse().unwrap();
        let fetcher = PagedFetcher::new(
            &source,
            "org/repo".parse().unwrap(),
            options(10, None, Some(3)),
            &predicate,
            &excluded,
        );

        let items = collect(fetcher).await.unwrap();
        let numbers: Vec<u64> = items.iter().map(|(r, _)| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn records_with_more_labels_are_still_yielded() {
        let mut source = FakeSource::new(3);
        source.more_labels = |n| n == 2;
        let predicate = predicate();
        let excluded = ExcludedAuthors::default();
        let fetcher = PagedFetcher::new(
            &source,
            "org/repo".parse().unwrap(),
            options(10, None, None),
            &predicate,
            &excluded,
        );

        let items = collect(fetcher).await.unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[1].0.has_more_labels);
        assert_eq!(items[1].1.as_deref(), Some("area-2"));
    }

    #[tokio::test]
    async fn fatal_page_error_surfaces_after_earlier_items() {
        let mut source = FakeSource::new(6);
        source.fail_on_page = Some(1);
        let predicate = predicate();
        let excluded = ExcludedAuthors::default();
        let mut fetcher = PagedFetcher::new(
            &source,
            "org/repo".parse().unwrap(),
            options(2, None, None),
            &predicate,
            &excluded,
        );

        assert_eq!(fetcher.next_item().await.unwrap().unwrap().0.number, 1);
        assert_eq!(fetcher.next_item().await.unwrap().unwrap().0.number, 2);
        assert!(matches!(
            fetcher.next_item().await,
            Err(ForgeError::Server { status: 503, .. })
        ));
        assert!(fetcher.next_item().await.unwrap().is_none());
        assert_eq!(fetcher.pages_fetched(), 1);
    }
}
