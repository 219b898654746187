use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use super::error::ForgeError;
use super::types::{
    Connection, GraphQlError, GraphQlRequest, GraphQlResponse, ItemKind, ItemNode, Page,
    PageRequest, Record, RepositoryData,
};
use super::{ItemGateway, PageSource};
use crate::input::RepoRef;
use crate::retry::{RetrySchedule, with_retries};

pub const API_URL: &str = "https://api.github.com";

const LABELS_PER_ITEM: u32 = 25;
const FILES_PER_PULL: u32 = 100;

/// GitHub client covering the few operations the labeler needs: paginated
/// issue/pull listing and single-item fetch over GraphQL, label add/remove over REST.
pub struct ForgeClient {
    client: Client,
    api_url: Url,
    token: String,
    retries: RetrySchedule,
}

impl fmt::Debug for ForgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForgeClient")
            .field("api_url", &self.api_url.as_str())
            .field("token", &"<redacted>")
            .field("retries", &self.retries)
            .finish()
    }
}

impl ForgeClient {
    /// Create a client for the API at `api_url`: github.com, GitHub Enterprise, or a test server.
    pub fn with_base_url(token: String, api_url: &str, retries: RetrySchedule) -> Result<Self> {
        let api_url = Url::parse(api_url).with_context(|| format!("invalid API URL '{api_url}'"))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url,
            token,
            retries,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn labels_url(&self, repo: &RepoRef, number: u64, label: Option<&str>) -> Url {
        let number = number.to_string();
        let mut segments = vec![
            "repos",
            repo.org.as_str(),
            repo.repo.as_str(),
            "issues",
            number.as_str(),
            "labels",
        ];
        segments.extend(label);
        self.endpoint(&segments)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(USER_AGENT, "labeler")
            .header(ACCEPT, "application/vnd.github+json")
    }

    /// One GraphQL round trip, without retries.
    async fn graphql<V, T>(&self, query: &str, variables: &V) -> Result<Option<T>, ForgeError>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let response = self
            .request(reqwest::Method::POST, self.endpoint(&["graphql"]))
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: GraphQlResponse<T> = response.json().await?;
        if let Some(fault) = graphql_fault(&body.errors) {
            return Err(fault);
        }
        Ok(body.data)
    }

    async fn fetch_page_once(&self, request: &PageRequest) -> Result<Page, ForgeError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Variables<'a> {
            owner: &'a str,
            repo: &'a str,
            after: Option<&'a str>,
            page_size: u32,
        }

        let query = page_query(request.kind);
        let variables = Variables {
            owner: &request.org,
            repo: &request.repo,
            after: request.after.as_deref(),
            page_size: request.page_size,
        };

        let data: Option<RepositoryData<Connection<ItemNode>>> =
            self.graphql(&query, &variables).await?;
        let connection = data
            .and_then(|d| d.repository)
            .and_then(|r| r.result)
            .ok_or_else(|| {
                ForgeError::NotFound(format!("repository {}/{}", request.org, request.repo))
            })?;

        Ok(Page {
            end_cursor: connection.page_info.end_cursor,
            has_next_page: connection.page_info.has_next_page,
            records: connection
                .nodes
                .into_iter()
                .map(|node| node.into_record(request.kind))
                .collect(),
        })
    }

    async fn fetch_one_once(
        &self,
        repo: &RepoRef,
        kind: ItemKind,
        number: u64,
    ) -> Result<Option<Record>, ForgeError> {
        #[derive(Serialize)]
        struct Variables<'a> {
            owner: &'a str,
            repo: &'a str,
            number: u64,
        }

        let query = item_query(kind);
        let variables = Variables {
            owner: &repo.org,
            repo: &repo.repo,
            number,
        };

        match self
            .graphql::<_, RepositoryData<ItemNode>>(&query, &variables)
            .await
        {
            Ok(data) => Ok(data
                .and_then(|d| d.repository)
                .and_then(|r| r.result)
                .map(|node| node.into_record(kind))),
            Err(ForgeError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn add_label_once(
        &self,
        repo: &RepoRef,
        number: u64,
        label: &str,
    ) -> Result<(), ForgeError> {
        let body = serde_json::json!({ "labels": [label] });
        let response = self
            .request(reqwest::Method::POST, self.labels_url(repo, number, None))
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn remove_label_once(
        &self,
        repo: &RepoRef,
        number: u64,
        label: &str,
    ) -> Result<(), ForgeError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                self.labels_url(repo, number, Some(label)),
            )
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(label, number, "label already absent");
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }
}

impl PageSource for ForgeClient {
    #[instrument(skip(self, request), fields(org = %request.org, repo = %request.repo, kind = %request.kind))]
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ForgeError> {
        let page = with_retries(&self.retries, "fetch page", || self.fetch_page_once(request)).await?;
        debug!(
            records = page.records.len(),
            has_next_page = page.has_next_page,
            "fetched page"
        );
        Ok(page)
    }
}

impl ItemGateway for ForgeClient {
    #[instrument(skip(self, repo), fields(repo = %repo, kind = %kind))]
    async fn fetch_one(
        &self,
        repo: &RepoRef,
        kind: ItemKind,
        number: u64,
    ) -> Result<Option<Record>, ForgeError> {
        with_retries(&self.retries, "fetch item", || {
            self.fetch_one_once(repo, kind, number)
        })
        .await
    }

    #[instrument(skip(self, repo), fields(repo = %repo, kind = %kind))]
    async fn add_label(
        &self,
        repo: &RepoRef,
        kind: ItemKind,
        number: u64,
        label: &str,
    ) -> Result<(), ForgeError> {
        with_retries(&self.retries, "add label", || {
            self.add_label_once(repo, number, label)
        })
        .await?;
        info!("added label '{label}' to {kind} #{number}");
        Ok(())
    }

    #[instrument(skip(self, repo), fields(repo = %repo, kind = %kind))]
    async fn remove_label(
        &self,
        repo: &RepoRef,
        kind: ItemKind,
        number: u64,
        label: &str,
    ) -> Result<(), ForgeError> {
        with_retries(&self.retries, "remove label", || {
            self.remove_label_once(repo, number, label)
        })
        .await?;
        info!("removed label '{label}' from {kind} #{number}");
        Ok(())
    }
}

fn node_fields(kind: ItemKind) -> String {
    let mut fields = format!(
        "number title body author {{ login }} \
         labels(first: {LABELS_PER_ITEM}) {{ pageInfo {{ hasNextPage }} nodes {{ name }} }}"
    );
    if kind == ItemKind::PullRequest {
        fields.push_str(&format!(" files(first: {FILES_PER_PULL}) {{ nodes {{ path }} }}"));
    }
    fields
}

fn page_query(kind: ItemKind) -> String {
    format!(
        "query ($owner: String!, $repo: String!, $after: String, $pageSize: Int!) {{ \
           repository(owner: $owner, name: $repo) {{ \
             result: {connection}(after: $after, first: $pageSize, orderBy: {{field: CREATED_AT, direction: DESC}}) {{ \
               pageInfo {{ hasNextPage endCursor }} \
               nodes {{ {fields} }} \
             }} \
           }} \
         }}",
        connection = kind.connection(),
        fields = node_fields(kind),
    )
}

fn item_query(kind: ItemKind) -> String {
    format!(
        "query ($owner: String!, $repo: String!, $number: Int!) {{ \
           repository(owner: $owner, name: $repo) {{ \
             result: {field}(number: $number) {{ {fields} }} \
           }} \
         }}",
        field = kind.field(),
        fields = node_fields(kind),
    )
}

/// Turns rate-limit signals and non-success statuses into faults.
async fn check_status(response: Response) -> Result<Response, ForgeError> {
    let status = response.status();
    if let Some(fault) = rate_limit_fault(status, response.headers()) {
        return Err(fault);
    }
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(text);
    Err(ForgeError::from_status(status.as_u16(), message))
}

fn rate_limit_fault(status: StatusCode, headers: &HeaderMap) -> Option<ForgeError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let retry_after = header("retry-after").and_then(|v| v.trim().parse::<u64>().ok());
    let exhausted = header("x-ratelimit-remaining") == Some("0");

    let limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (retry_after.is_some() || exhausted));
    if !limited {
        return None;
    }

    let resume_after = retry_after.map(Duration::from_secs).or_else(|| {
        header("x-ratelimit-reset")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|reset| {
                let now = chrono::Utc::now().timestamp();
                Duration::from_secs((reset - now).max(0) as u64)
            })
    });
    Some(ForgeError::RateLimited { resume_after })
}

fn graphql_fault(errors: &[GraphQlError]) -> Option<ForgeError> {
    if errors.is_empty() {
        return None;
    }
    let has_type = |t: &str| errors.iter().any(|e| e.error_type.as_deref() == Some(t));
    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    Some(if has_type("RATE_LIMITED") {
        ForgeError::RateLimited { resume_after: None }
    } else if has_type("NOT_FOUND") {
        ForgeError::NotFound(message)
    } else {
        ForgeError::GraphQl(message)
    })
}
