//! OAuth2 credential handling for the Gmail API.
//!
//! Client credentials come from the `credentials.json` file downloaded from
//! the Google Cloud console. User tokens are cached in a JSON file that uses
//! the same layout as Go's `oauth2.Token`, so token files written by other
//! tools keep working.

use crate::error::{Error, Result};
use crate::util::{extract_code, mask_token};
use chrono::{DateTime, Datelike, Duration, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse, BasicTokenType};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet, EndpointSet,
    HttpRequest, HttpResponse, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tracing::{debug, info, instrument, warn};

/// Full read/write access, required by `messages.batchDelete`.
pub const MAIL_SCOPE: &str = "https://mail.google.com/";

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// State value sent with the consent URL and checked on the redirect.
pub const AUTH_STATE: &str = "state-token";

/// Tokens are considered expired this long before their actual expiry.
const EXPIRY_DELTA_SECS: i64 = 10;

const TOKEN_ENDPOINT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

// ============ Client credentials ============

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Parse a Google client secret file. Both "installed" and "web"
    /// application types are accepted.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let file: CredentialsFile = serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidCredentials(e.to_string()))?;

        let secret = file.installed.or(file.web).ok_or_else(|| {
            Error::InvalidCredentials("expected an \"installed\" or \"web\" section".into())
        })?;

        if secret.client_id.trim().is_empty() {
            return Err(Error::InvalidCredentials("client_id is empty".into()));
        }

        Ok(secret)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| Error::CredentialsRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&bytes)
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(OOB_REDIRECT_URI)
    }
}

// ============ Token ============

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    /// Expiry, with Go's zero time (`0001-01-01T00:00:00Z`) read as unset.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry.filter(|exp| exp.year() > 1)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        match self.expires_at() {
            Some(exp) => now >= exp - Duration::seconds(EXPIRY_DELTA_SECS),
            None => false,
        }
    }

    fn from_response(res: &BasicTokenResponse, previous_refresh: Option<&str>) -> Self {
        let token_type = match res.token_type() {
            BasicTokenType::Bearer => "Bearer".to_string(),
            BasicTokenType::Mac => "MAC".to_string(),
            BasicTokenType::Extension(other) => other.clone(),
        };

        let expiry = res
            .expires_in()
            .and_then(|d| Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        Self {
            access_token: res.access_token().secret().clone(),
            token_type,
            refresh_token: res
                .refresh_token()
                .map(|t| t.secret().clone())
                .or_else(|| previous_refresh.map(str::to_string)),
            expiry,
        }
    }
}

// ============ Token cache ============

/// Where tokens are kept between runs.
pub trait TokenCache {
    fn load(&self) -> Option<Token>;
    fn save(&self, token: &Token) -> Result<()>;
}

/// File-backed token cache.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenCache for TokenStore {
    /// A missing or unreadable file yields `None` so that the caller falls
    /// back to the browser flow.
    fn load(&self) -> Option<Token> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No cached token");
                return None;
            }
        };

        match serde_json::from_str::<Token>(&content) {
            Ok(token) => {
                debug!(
                    path = %self.path.display(),
                    access_token = %mask_token(&token.access_token),
                    expiry = ?token.expires_at(),
                    "Loaded cached token"
                );
                Some(token)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable token file");
                None
            }
        }
    }

    fn save(&self, token: &Token) -> Result<()> {
        eprintln!("Saving OAuth token to: {}", self.path.display());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

// ============ Authorization flow ============

type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

pub struct Authenticator {
    client: OAuthClient,
    http: reqwest::Client,
}

fn describe_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> String
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(resp) => resp.to_string(),
        RequestTokenError::Request(e) => format!("request failed: {e}"),
        RequestTokenError::Parse(e, _) => format!("unexpected token response: {e}"),
        RequestTokenError::Other(msg) => msg,
    }
}

/// Carry an oauth2 token request over the crate's reqwest client.
async fn send_oauth2_request(http: reqwest::Client, request: HttpRequest) -> Result<HttpResponse> {
    let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
        .map_err(|e| Error::OAuth(format!("invalid token request method: {e}")))?;

    let mut builder = http.request(method, request.uri().to_string());
    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    let response = builder.body(request.into_body()).send().await?;
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.bytes().await?;

    let mut oauth2_response = oauth2::http::Response::builder().status(status);
    for (name, value) in headers.iter() {
        oauth2_response = oauth2_response.header(name.as_str(), value.as_bytes());
    }

    oauth2_response
        .body(body.to_vec())
        .map_err(|e| Error::OAuth(format!("cannot read token response: {e}")))
}

/// Print the consent URL to `output`, then read the authorization code
/// (or the whole redirect URL) from `input`.
fn read_code<R: BufRead, W: Write>(url: &str, input: &mut R, output: &mut W) -> Result<String> {
    writeln!(
        output,
        "Go to the following link in your browser then type the authorization code:\n{url}"
    )?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(Error::AuthorizationCode("no input".into()));
    }

    extract_code(&line, AUTH_STATE)
}

impl Authenticator {
    pub fn new(secret: &ClientSecret) -> Result<Self> {
        let auth_url = AuthUrl::new(secret.auth_uri.clone())
            .map_err(|e| Error::InvalidCredentials(format!("auth_uri: {e}")))?;
        let token_url = TokenUrl::new(secret.token_uri.clone())
            .map_err(|e| Error::InvalidCredentials(format!("token_uri: {e}")))?;
        let redirect_url = RedirectUrl::new(secret.redirect_uri().to_string())
            .map_err(|e| Error::InvalidCredentials(format!("redirect_uris: {e}")))?;

        let mut client = BasicClient::new(ClientId::new(secret.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url)
            .set_auth_type(AuthType::RequestBody);

        if let Some(client_secret) = &secret.client_secret {
            client = client.set_client_secret(oauth2::ClientSecret::new(client_secret.clone()));
        }

        // The token endpoint must not redirect the credentials elsewhere.
        let http = reqwest::Client::builder()
            .timeout(TOKEN_ENDPOINT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, http })
    }

    /// Consent URL requesting offline access, so a refresh token is issued.
    pub fn authorize_url(&self, state: &str) -> String {
        let (url, _) = self
            .client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scope(Scope::new(MAIL_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .url();
        url.to_string()
    }

    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<Token> {
        debug!("Exchanging authorization code");
        let http = self.http.clone();
        let res = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&|request: HttpRequest| send_oauth2_request(http.clone(), request))
            .await
            .map_err(|e| Error::OAuth(format!("unable to retrieve token: {}", describe_token_error(e))))?;

        Ok(Token::from_response(&res, None))
    }

    #[instrument(skip(self, token))]
    pub async fn refresh(&self, token: &Token) -> Result<Token> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::OAuth("token has no refresh token".into()))?;

        debug!(refresh_token = %mask_token(refresh_token), "Refreshing access token");
        let http = self.http.clone();
        let res = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&|request: HttpRequest| send_oauth2_request(http.clone(), request))
            .await
            .map_err(|e| Error::OAuth(format!("unable to refresh token: {}", describe_token_error(e))))?;

        Ok(Token::from_response(&res, Some(refresh_token)))
    }

    /// Interactive flow: prompt on `output`, read the code from `input` off
    /// the async runtime, then exchange it.
    pub async fn token_from_web<R, W>(&self, mut input: R, mut output: W) -> Result<Token>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let url = self.authorize_url(AUTH_STATE);
        let code = tokio::task::spawn_blocking(move || read_code(&url, &mut input, &mut output))
            .await
            .map_err(|e| Error::AuthorizationCode(e.to_string()))??;

        self.exchange_code(&code).await
    }

    /// `obtain_token_with` on stdin/stderr.
    pub async fn obtain_token(&self, cache: &impl TokenCache) -> Result<Token> {
        self.obtain_token_with(cache, BufReader::new(io::stdin()), io::stderr())
            .await
    }

    /// Cached token if valid, else a refreshed one, else a new one from the
    /// browser flow. New tokens are written back to the cache.
    pub async fn obtain_token_with<R, W>(
        &self,
        cache: &impl TokenCache,
        input: R,
        output: W,
    ) -> Result<Token>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        if let Some(token) = cache.load() {
            if !token.is_expired() {
                debug!("Reusing cached token");
                return Ok(token);
            }

            if token.refresh_token.is_some() {
                match self.refresh(&token).await {
                    Ok(refreshed) => {
                        info!("Access token refreshed");
                        if let Err(e) = cache.save(&refreshed) {
                            warn!(error = %e, "Unable to cache refreshed token");
                        }
                        return Ok(refreshed);
                    }
                    Err(e) => warn!(error = %e, "Token refresh failed, starting authorization flow"),
                }
            }
        }

        let token = self.token_from_web(input, output).await?;
        cache.save(&token)?;
        Ok(token)
    }
}
