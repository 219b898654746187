//! `validate`: checks a training export before it is handed to a trainer.

use std::process::ExitCode;

use anyhow::Result;
use console::Style;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::forge::ItemKind;
use crate::tsv;

pub fn run(args: &ValidateArgs) -> Result<ExitCode> {
    let kind = ItemKind::from(args.kind);
    let records = tsv::validate(&args.data, kind)?;

    info!("{} is a valid {kind} export", args.data.display());
    println!(
        "  {} {} contains {records} {kind} records",
        Style::new().green().bold().apply_to("✓"),
        args.data.display()
    );
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::KindArg;
    use crate::error::DataError;
    use crate::state_machine::testing::issue;
    use crate::tsv::ExportWriter;
    use tempfile::TempDir;

    #[test]
    fn accepts_a_complete_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issues.tsv");
        let mut writer = ExportWriter::create(&path, ItemKind::Issue).unwrap();
        for n in 1..=12 {
            writer.write_record("area-a", &issue(n, &[])).unwrap();
        }
        writer.finish().unwrap();

        let args = ValidateArgs {
            kind: KindArg::Issues,
            data: path,
        };
        assert!(run(&args).is_ok());
    }

    #[test]
    fn issue_export_is_not_a_pull_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issues.tsv");
        let mut writer = ExportWriter::create(&path, ItemKind::Issue).unwrap();
        for n in 1..=12 {
            writer.write_record("area-a", &issue(n, &[])).unwrap();
        }
        writer.finish().unwrap();

        let args = ValidateArgs {
            kind: KindArg::Pulls,
            data: path,
        };
        let err = run(&args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::MalformedRow { expected: 5, found: 3, .. })
        ));
    }
}
