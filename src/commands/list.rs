use super::auth::{AuthPaths, authorized_client};
use crate::config::Config;
use crate::models::{MessageList, Output};

pub async fn list_messages(paths: AuthPaths<'_>, query: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let query = config.resolve_query(query)?;
    let client = authorized_client(&config, paths).await?;

    let ids = client.list_message_ids(&query).await?;
    Output::success(MessageList {
        query,
        count: ids.len(),
        ids,
    })
    .print();

    Ok(())
}
