use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::spotify::types::TokenResponse;

const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

const SCOPES: &str = "playlist-modify-public playlist-modify-private playlist-read-private";

/// Seconds of remaining validity below which a cached token is refreshed.
const EXPIRY_MARGIN_SECS: i64 = 60;

pub const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";

#[derive(Debug, thiserror::Error)]
#[error("environment variable {0} is not set")]
pub struct MissingCredential(pub &'static str);

/// Spotify application credentials, read from the process environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, MissingCredential> {
        let var = |name: &'static str| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.is_empty())
                .ok_or(MissingCredential(name))
        };
        Ok(Self {
            client_id: var(ENV_CLIENT_ID)?,
            client_secret: var(ENV_CLIENT_SECRET)?,
            redirect_uri: var(ENV_REDIRECT_URI)?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authorization was rejected: {reason}")]
    Rejected { reason: String },
    #[error("failed to send http request: {0}")]
    FailedToSendRequest(#[source] reqwest::Error),
    #[error("failed to parse token response: {0}")]
    FailedToParseResponse(#[source] reqwest::Error),
    #[error("pasted redirect URL is not a valid URL: {0}")]
    BadRedirectUrl(#[from] url::ParseError),
    #[error("redirect URL is missing the authorization code")]
    MissingCode,
    #[error("state parameter does not match; aborting for safety")]
    StateMismatch,
    #[error("failed to read from stdin: {0}")]
    Stdin(#[from] std::io::Error),
}

/// Token persisted between runs so the browser handshake only happens once.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    /// Epoch seconds after which `access_token` is no longer valid.
    expires_at: i64,
}

fn cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|path| path.join("apple-to-spotify").join("token.json"))
}

fn load_cached_token() -> Option<CachedToken> {
    let contents = std::fs::read_to_string(cache_path()?).ok()?;
    serde_json::from_str(&contents).ok()
}

fn store_cached_token(token: &CachedToken) {
    let Some(path) = cache_path() else { return };
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string(token)?)?;
        Ok(())
    };
    if let Err(err) = write() {
        log::warn!("failed to cache token at {}: {err}", path.display());
    }
}

fn cache_from_response(response: &TokenResponse, old_refresh: Option<&str>) -> CachedToken {
    CachedToken {
        access_token: response.access_token.clone(),
        refresh_token: response
            .refresh_token
            .clone()
            .or_else(|| old_refresh.map(str::to_string)),
        expires_at: chrono::Utc::now().timestamp() + response.expires_in as i64,
    }
}

/// Random state parameter for CSRF protection
fn generate_state() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..16)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

fn authorize_url(credentials: &Credentials, state: &str) -> String {
    format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&state={}&scope={}",
        SPOTIFY_AUTH_URL,
        urlencoding::encode(&credentials.client_id),
        urlencoding::encode(&credentials.redirect_uri),
        urlencoding::encode(state),
        urlencoding::encode(SCOPES)
    )
}

/// Obtain an access token with the playlist scopes.
///
/// Uses the cached token when still valid, refreshes it when possible, and
/// otherwise walks the user through the browser-based authorization-code
/// handshake.
pub async fn access_token(credentials: &Credentials) -> Result<String, AuthError> {
    if let Some(cached) = load_cached_token() {
        if chrono::Utc::now().timestamp() + EXPIRY_MARGIN_SECS < cached.expires_at {
            log::debug!("using cached access token");
            return Ok(cached.access_token);
        }
        if let Some(refresh_token) = &cached.refresh_token {
            match refresh_access_token(credentials, refresh_token).await {
                Ok(response) => {
                    let cached = cache_from_response(&response, Some(refresh_token));
                    store_cached_token(&cached);
                    return Ok(cached.access_token);
                }
                Err(err) => {
                    log::warn!("token refresh failed, falling back to interactive login: {err}");
                }
            }
        }
    }
    interactive_login(credentials).await
}

/// Print the authorize URL, let the user approve in a browser, and read the
/// redirect URL they paste back.
async fn interactive_login(credentials: &Credentials) -> Result<String, AuthError> {
    let state = generate_state();
    println!("Open this URL in your browser and approve access:");
    println!("  {}", authorize_url(credentials, &state));
    print!("Paste the URL you were redirected to: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let redirect = url::Url::parse(line.trim())?;

    let mut code = None;
    let mut returned_state = None;
    for (key, value) in redirect.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => returned_state = Some(value.into_owned()),
            _ => {}
        }
    }
    if returned_state.as_deref() != Some(state.as_str()) {
        return Err(AuthError::StateMismatch);
    }
    let code = code.ok_or(AuthError::MissingCode)?;

    let response = exchange_code_for_token(credentials, &code).await?;
    let cached = cache_from_response(&response, None);
    store_cached_token(&cached);
    Ok(cached.access_token)
}

fn basic_auth_header(credentials: &Credentials) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ))
    )
}

async fn token_request(
    credentials: &Credentials,
    params: HashMap<&str, &str>,
) -> Result<TokenResponse, AuthError> {
    let client = reqwest::Client::new();
    let response = client
        .post(SPOTIFY_TOKEN_URL)
        // Serializes to x-www-form-urlencoded, as the token endpoint requires
        .form(&params)
        .header("Authorization", basic_auth_header(credentials))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(AuthError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(AuthError::Rejected {
            reason: response
                .text()
                .await
                .unwrap_or_else(|_| "failed to get error text".to_string()),
        });
    }

    response
        .json()
        .await
        .map_err(AuthError::FailedToParseResponse)
}

/// Exchange an authorization code for an access token
/// https://developer.spotify.com/documentation/web-api/tutorials/code-flow
async fn exchange_code_for_token(
    credentials: &Credentials,
    code: &str,
) -> Result<TokenResponse, AuthError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "authorization_code");
    params.insert("code", code);
    params.insert("redirect_uri", credentials.redirect_uri.as_str());
    token_request(credentials, params).await
}

/// Refresh an access token using a refresh token
async fn refresh_access_token(
    credentials: &Credentials,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "refresh_token");
    params.insert("refresh_token", refresh_token);
    token_request(credentials, params).await
}
