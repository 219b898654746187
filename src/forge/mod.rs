pub mod client;
pub mod error;
pub mod pager;
pub mod types;

use std::future::Future;

pub use client::ForgeClient;
pub use error::ForgeError;
pub use pager::{PagedFetcher, PagerOptions};
pub use types::{ItemKind, Page, PageRequest, Record};

use crate::input::RepoRef;

/// Source of pages for a paginated collection. Implementations apply the retry
/// protocol to each request.
pub trait PageSource: Send + Sync {
    fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<Page, ForgeError>> + Send;
}

/// Single-item operations. Implementations apply the retry protocol to each request.
pub trait ItemGateway: Send + Sync {
    /// `Ok(None)` when the item does not exist. That is not an error.
    fn fetch_one(
        &self,
        repo: &RepoRef,
        kind: ItemKind,
        number: u64,
    ) -> impl Future<Output = Result<Option<Record>, ForgeError>> + Send;

    fn add_label(
        &self,
        repo: &RepoRef,
        kind: ItemKind,
        number: u64,
        label: &str,
    ) -> impl Future<Output = Result<(), ForgeError>> + Send;

    fn remove_label(
        &self,
        repo: &RepoRef,
        kind: ItemKind,
        number: u64,
        label: &str,
    ) -> impl Future<Output = Result<(), ForgeError>> + Send;
}
