//! `download`: pages through repositories and writes tab-separated training data.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use tracing::{debug, info};

use super::Context;
use crate::cli::DownloadArgs;
use crate::error::LabelerError;
use crate::forge::{ItemKind, PageSource, PagedFetcher, PagerOptions, Record};
use crate::input::{ExcludedAuthors, LabelPredicate, RepoList};
use crate::tsv::ExportWriter;
use crate::ui::Progress;

pub async fn run(args: DownloadArgs, ctx: &Context) -> Result<ExitCode> {
    if args.issues_data.is_none() && args.pulls_data.is_none() {
        return Err(LabelerError::Config(
            "at least one of --issues-data or --pulls-data is required".into(),
        )
        .into());
    }

    let client = ctx.forge_client()?;
    let progress = Progress::start(&format!("Downloading training data from {}", args.repo.org));

    let issues = download_kind(
        &client,
        &args,
        ctx,
        ItemKind::Issue,
        args.issues_data.as_deref(),
        args.issues_limit,
    );
    let pulls = download_kind(
        &client,
        &args,
        ctx,
        ItemKind::PullRequest,
        args.pulls_data.as_deref(),
        args.pulls_limit,
    );

    match tokio::try_join!(issues, pulls) {
        Ok((issues, pulls)) => {
            progress.finish(&format!(
                "Exported {issues} issues and {pulls} pull requests"
            ));
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            progress.fail("Download failed");
            Err(err)
        }
    }
}

async fn download_kind<S: PageSource>(
    source: &S,
    args: &DownloadArgs,
    ctx: &Context,
    kind: ItemKind,
    path: Option<&Path>,
    limit: Option<usize>,
) -> Result<usize> {
    let Some(path) = path else {
        return Ok(0);
    };

    let mut writer = ExportWriter::create(path, kind)
        .with_context(|| format!("failed to create '{}'", path.display()))?;
    let options = ctx.pager_options(kind, &args.paging);
    export(
        source,
        &args.repo,
        &args.label_prefix,
        &args.excluded_authors,
        options,
        limit,
        &mut writer,
    )
    .await?;

    let rows = writer.finish()?;
    info!("Wrote {rows} {kind} rows to {}", path.display());
    Ok(rows)
}

/// Writes each exportable record of every repository, in page order, until
/// `limit` rows have been written in total.
pub async fn export<S: PageSource, W: Write>(
    source: &S,
    repos: &RepoList,
    predicate: &LabelPredicate,
    excluded: &ExcludedAuthors,
    options: PagerOptions,
    limit: Option<usize>,
    writer: &mut ExportWriter<W>,
) -> Result<()> {
    for repo in repos.iter() {
        if limit.is_some_and(|limit| writer.written() >= limit) {
            break;
        }
        let before = writer.written();
        let mut fetcher = PagedFetcher::new(source, repo.clone(), options, predicate, excluded);

        while limit.is_none_or(|limit| writer.written() < limit) {
            let Some((record, _)) = fetcher.next_item().await? else {
                break;
            };
            match exportable_label(&record, predicate) {
                Some(label) => writer.write_record(label, &record)?,
                None => debug!(number = record.number, "not exported"),
            }
        }
        info!(
            "Exported {} {} rows from {repo} ({} pages).",
            writer.written() - before,
            options.kind,
            fetcher.pages_fetched()
        );
    }
    Ok(())
}

/// The record's only applicable label. Records with none, several, or an
/// incompletely observed label set are not usable as training rows.
fn exportable_label<'a>(record: &'a Record, predicate: &LabelPredicate) -> Option<&'a str> {
    if record.has_more_labels {
        return None;
    }
    let mut applicable = record.labels.iter().filter(|label| predicate.matches(label));
    match (applicable.next(), applicable.next()) {
        (Some(label), None) => Some(label),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::testing::{StaticSource, issue};

    fn predicate() -> LabelPredicate {
        "area-".parse().unwrap()
    }

    fn options() -> PagerOptions {
        PagerOptions {
            kind: ItemKind::Issue,
            page_size: 100,
            page_limit: None,
            item_limit: None,
        }
    }

    fn records() -> Vec<Record> {
        let mut truncated = issue(4, &["area-d"]);
        truncated.has_more_labels = true;
        let mut by_bot = issue(5, &["area-e"]);
        by_bot.author = Some("dependabot".into());
        vec![
            issue(1, &["bug", "area-a"]),
            issue(2, &["area-a", "area-b"]),
            issue(3, &["bug"]),
            truncated,
            by_bot,
            issue(6, &["Area-F"]),
        ]
    }

    async fn run_export(limit: Option<usize>) -> usize {
        let source = StaticSource(records());
        let repos: RepoList = "org/repo".parse().unwrap();
        let excluded: ExcludedAuthors = "dependabot".parse().unwrap();
        let mut writer = ExportWriter::new(Vec::new(), ItemKind::Issue).unwrap();

        export(&source, &repos, &predicate(), &excluded, options(), limit, &mut writer)
            .await
            .unwrap();

        writer.written()
    }

    #[tokio::test]
    async fn exports_records_with_exactly_one_applicable_label() {
        let source = StaticSource(records());
        let repos: RepoList = "org/repo".parse().unwrap();
        let excluded: ExcludedAuthors = "dependabot".parse().unwrap();
        let mut buffer = Vec::new();
        {
            let mut writer = ExportWriter::new(&mut buffer, ItemKind::Issue).unwrap();
            export(&source, &repos, &predicate(), &excluded, options(), None, &mut writer)
                .await
                .unwrap();
            assert_eq!(writer.finish().unwrap(), 2);
        }

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["Label\tTitle\tBody", "area-a\tIssue 1\tbody", "Area-F\tIssue 6\tbody"]
        );
    }

    #[tokio::test]
    async fn limit_counts_written_rows() {
        assert_eq!(run_export(Some(1)).await, 1);
        assert_eq!(run_export(None).await, 2);
    }

    #[tokio::test]
    async fn every_repository_is_visited() {
        let source = StaticSource(vec![issue(1, &["area-a"])]);
        let repos: RepoList = "org/one,org/two".parse().unwrap();
        let mut writer = ExportWriter::new(Vec::new(), ItemKind::Issue).unwrap();

        export(
            &source,
            &repos,
            &predicate(),
            &ExcludedAuthors::default(),
            options(),
            None,
            &mut writer,
        )
        .await
        .unwrap();

        assert_eq!(writer.written(), 2);
    }

    #[tokio::test]
    async fn limit_is_shared_across_repositories() {
        let source = StaticSource(vec![issue(1, &["area-a"]), issue(2, &["area-b"])]);
        let repos: RepoList = "org/one,org/two".parse().unwrap();
        let mut writer = ExportWriter::new(Vec::new(), ItemKind::Issue).unwrap();

        export(
            &source,
            &repos,
            &predicate(),
            &ExcludedAuthors::default(),
            options(),
            Some(3),
            &mut writer,
        )
        .await
        .unwrap();

        assert_eq!(writer.written(), 3);
    }
}
