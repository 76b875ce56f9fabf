use crate::config::{Config, check_query};
use crate::models::Output;
use std::path::PathBuf;

/// Store the given defaults; with nothing given, print the current config.
pub fn configure(
    credentials: Option<PathBuf>,
    token: Option<PathBuf>,
    query: Option<String>,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    if credentials.is_none() && token.is_none() && query.is_none() {
        Output::success(config).print();
        return Ok(());
    }

    if credentials.is_some() {
        config.credentials_path = credentials;
    }
    if token.is_some() {
        config.token_path = token;
    }
    if let Some(query) = query {
        check_query(&query)?;
        config.query = Some(query);
    }
    config.save()?;

    Output::success(config).print();

    Ok(())
}
