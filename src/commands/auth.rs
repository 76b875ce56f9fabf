use crate::config::Config;
use crate::gmail::GmailClient;
use crate::models::Output;
use crate::oauth::{Authenticator, ClientSecret, Token, TokenStore};
use std::path::Path;
use tracing::debug;

/// Credentials and token cache paths given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthPaths<'a> {
    pub credentials: Option<&'a Path>,
    pub token: Option<&'a Path>,
}

pub(crate) async fn obtain_token(config: &Config, paths: AuthPaths<'_>) -> anyhow::Result<Token> {
    let credentials = config.resolve_credentials(paths.credentials);
    let store = TokenStore::new(config.resolve_token(paths.token));
    debug!(
        credentials = %credentials.display(),
        token = %store.path().display(),
        "Resolving OAuth token"
    );

    let secret = ClientSecret::load(&credentials)?;
    let authenticator = Authenticator::new(&secret)?;
    Ok(authenticator.obtain_token(&store).await?)
}

pub(crate) async fn authorized_client(
    config: &Config,
    paths: AuthPaths<'_>,
) -> anyhow::Result<GmailClient> {
    let token = obtain_token(config, paths).await?;
    Ok(GmailClient::new(token.access_token)?)
}

pub async fn auth(paths: AuthPaths<'_>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let token = obtain_token(&config, paths).await?;

    let message = match token.expires_at() {
        Some(exp) => format!("Authenticated, access token valid until {}", exp.to_rfc3339()),
        None => "Authenticated".to_string(),
    };
    Output::<()>::success_msg(message).print();

    Ok(())
}
