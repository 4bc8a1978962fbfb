//! `appstash version-info` command.

use std::path::PathBuf;

use clap::Args;

use crate::output;

#[derive(Args)]
pub struct VersionInfoArgs {
    /// Application id
    pub app_id: String,

    /// Version sequence number
    pub sequence: i64,

    /// Version metadata directory (default: ~/.appstash/versions)
    #[arg(long)]
    pub metadata_dir: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: VersionInfoArgs) -> Result<(), Box<dyn std::error::Error>> {
    let index = super::open_metadata_index(args.metadata_dir.as_ref())?;

    let envelope = index.get_version_metadata(&args.app_id, args.sequence)?;
    let gitops = index.is_gitops_supported_for_version(&args.app_id, args.sequence)?;
    let rollback = index.is_rollback_supported_for_version(&args.app_id, args.sequence)?;
    let snapshots = index.is_snapshots_supported_for_version(&args.app_id, args.sequence)?;

    if args.json {
        let out = serde_json::json!({
            "appId": args.app_id,
            "sequence": args.sequence,
            "recorded": envelope.is_some(),
            "versionLabel": envelope.as_ref().and_then(|e| e.version_label.clone()),
            "gitopsSupported": gitops,
            "rollbackSupported": rollback,
            "snapshotsSupported": snapshots,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if envelope.is_none() {
        eprintln!(
            "No metadata recorded for {} sequence {}",
            args.app_id, args.sequence
        );
    }

    let label = envelope
        .as_ref()
        .and_then(|e| e.version_label.clone())
        .unwrap_or_default();
    let mut table = output::new_table(&["SEQUENCE", "LABEL", "GITOPS", "ROLLBACK", "SNAPSHOTS"]);
    table.add_row([
        args.sequence.to_string(),
        label,
        output::yes_no(gitops).to_string(),
        output::yes_no(rollback).to_string(),
        output::yes_no(snapshots).to_string(),
    ]);
    println!("{table}");
    Ok(())
}
