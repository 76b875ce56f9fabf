use super::auth::{AuthPaths, authorized_client};
use crate::config::{Config, check_query};
use crate::error::Result;
use crate::gmail::GmailClient;
use crate::models::{Output, PurgeReport};
use tracing::info;

/// List everything matching `query` and delete it, unless `dry_run`.
pub async fn run_purge(client: &GmailClient, query: &str, dry_run: bool) -> Result<PurgeReport> {
    check_query(query)?;

    let ids = client.list_message_ids(query).await?;
    let deleted = if dry_run {
        0
    } else {
        client.batch_delete(&ids).await?
    };
    info!(query = %query, matched = ids.len(), deleted, dry_run, "Purge finished");

    Ok(PurgeReport {
        query: query.to_string(),
        matched: ids.len(),
        deleted,
        dry_run,
    })
}

pub async fn purge(paths: AuthPaths<'_>, query: Option<&str>, dry_run: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let query = config.resolve_query(query)?;
    let client = authorized_client(&config, paths).await?;

    let report = run_purge(&client, &query, dry_run).await?;
    Output::success(report).print();

    Ok(())
}
