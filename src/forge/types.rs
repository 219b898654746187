//! Records handed to the prediction workflow, plus the GraphQL shapes they
//! are decoded from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Issue or pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Issue,
    PullRequest,
}

impl ItemKind {
    /// Name of the GraphQL connection listing this kind on a repository.
    pub(crate) fn connection(self) -> &'static str {
        match self {
            ItemKind::Issue => "issues",
            ItemKind::PullRequest => "pullRequests",
        }
    }

    /// Name of the GraphQL field fetching one item of this kind.
    pub(crate) fn field(self) -> &'static str {
        match self {
            ItemKind::Issue => "issue",
            ItemKind::PullRequest => "pullRequest",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Issue => write!(f, "Issue"),
            ItemKind::PullRequest => write!(f, "Pull Request"),
        }
    }
}

/// A fetched issue or pull request normalized for prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub kind: ItemKind,
    pub number: u64,
    pub title: String,
    pub body: String,
    pub author: Option<String>,
    pub labels: Vec<String>,
    /// The label set was paginated and not fully retrieved, so the absence of
    /// a label cannot be proven.
    pub has_more_labels: bool,
    /// Changed file paths. Always empty for issues.
    pub files: Vec<String>,
    /// Distinct folders containing `files`, in first-seen order.
    pub folders: Vec<String>,
}

impl Record {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    /// Final path component of each changed file.
    pub fn file_names(&self) -> Vec<&str> {
        self.files
            .iter()
            .map(|path| path.rsplit('/').next().unwrap_or(path))
            .collect()
    }

    pub fn folder_names(&self) -> Vec<&str> {
        self.folders.iter().map(String::as_str).collect()
    }
}

/// Distinct containing folders of `paths`, in first-seen order. Files at the
/// repository root have no folder.
pub fn containing_folders(paths: &[String]) -> Vec<String> {
    let mut folders: Vec<String> = Vec::new();
    for path in paths {
        if let Some((folder, _)) = path.rsplit_once('/') {
            if !folders.iter().any(|f| f == folder) {
                folders.push(folder.to_string());
            }
        }
    }
    folders
}

/// One page of a paginated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Arguments for fetching one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub org: String,
    pub repo: String,
    pub kind: ItemKind,
    pub page_size: u32,
    pub after: Option<String>,
}

// ---------------------------------------------------------------------------
// GraphQL wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct GraphQlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub variables: V,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryData<T> {
    pub repository: Option<RepositoryResult<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryResult<T> {
    pub result: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Connection<T> {
    pub page_info: PageInfo,
    #[serde(default)]
    pub nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemNode {
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    pub labels: Connection<NamedNode>,
    #[serde(default)]
    pub files: Option<FilesConnection>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Author {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NamedNode {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FilesConnection {
    #[serde(default)]
    pub nodes: Vec<FileNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileNode {
    pub path: String,
}

impl ItemNode {
    pub(crate) fn into_record(self, kind: ItemKind) -> Record {
        let files: Vec<String> = self
            .files
            .map(|f| f.nodes.into_iter().map(|n| n.path).collect())
            .unwrap_or_default();
        Record {
            kind,
            number: self.number,
            title: self.title.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            author: self.author.map(|a| a.login),
            has_more_labels: self.labels.page_info.has_next_page,
            labels: self.labels.nodes.into_iter().map(|l| l.name).collect(),
            folders: containing_folders(&files),
            files,
        }
    }
}
