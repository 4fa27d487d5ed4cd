use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tiny_http::{Response, Server};
use url::form_urlencoded;

use crate::config::AppConfig;
use crate::error::{IntakeError, Result};
use crate::util::{no_deadline_agent, response_json};

// ── OAuth endpoints ─────────────────────────────────────────────────────

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope limited to files the application itself creates.
pub(crate) const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Redirect registered for codes obtained out-of-band (headless mode).
const HEADLESS_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Tokens within this many seconds of expiry are treated as expired.
const EXPIRY_SLACK_SECS: i64 = 60;

// ── Credential material ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ClientSecrets {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
}

/// Google client-secrets JSON as downloaded from the console.
#[derive(Debug, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    installed: Option<ClientSecrets>,
    #[serde(default)]
    web: Option<ClientSecrets>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub(crate) struct TokenCache {
    #[serde(default)]
    pub(crate) access_token: Option<String>,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
    /// Unix seconds; absent in caches written by other tooling.
    #[serde(default)]
    pub(crate) expires_at: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// True when the cached token cannot be used as-is. A cache without an
/// expiry stamp is trusted; the remote call will reject it if stale.
pub(crate) fn token_expired(token: &TokenCache, now: i64) -> bool {
    match token.expires_at {
        Some(expires_at) => now + EXPIRY_SLACK_SECS >= expires_at,
        None => false,
    }
}

/// Builds the persisted cache from a token-endpoint response, carrying the
/// previous refresh token forward when the response omits one.
pub(crate) fn cache_from_response(
    payload: &serde_json::Value,
    previous_refresh: Option<String>,
    now: i64,
) -> Result<TokenCache> {
    let response: TokenResponse =
        serde_json::from_value(payload.clone()).map_err(|e| IntakeError::RemoteService {
            reason: format!("token response: {e}"),
        })?;
    if response.access_token.is_none() {
        return Err(IntakeError::RemoteService {
            reason: format!("token endpoint returned no access_token: {payload}"),
        });
    }
    Ok(TokenCache {
        access_token: response.access_token,
        refresh_token: response.refresh_token.or(previous_refresh),
        expires_at: response.expires_in.map(|secs| now + secs),
    })
}

// ── Provider ────────────────────────────────────────────────────────────

/// Single capability: obtain a valid access token, refreshing or acquiring
/// as needed. Acquisition runs either the interactive loopback flow (the
/// `auth` subcommand) or a pre-obtained authorization code from
/// configuration; callers never know which ran.
#[derive(Debug, Clone)]
pub(crate) struct CredentialProvider {
    credentials_path: PathBuf,
    token_path: PathBuf,
    auth_code: Option<String>,
}

impl CredentialProvider {
    pub(crate) fn new(config: &AppConfig) -> Self {
        CredentialProvider {
            credentials_path: config.credentials_path.clone(),
            token_path: config.token_path.clone(),
            auth_code: config.auth_code.clone(),
        }
    }

    pub(crate) fn access_token(&self) -> Result<String> {
        let cached = load_token(&self.token_path);
        if let Some(token) = &cached {
            if let Some(access) = token.access_token.as_deref() {
                if !token_expired(token, Utc::now().timestamp()) {
                    return Ok(access.to_string());
                }
            }
        }
        if let Some(refresh) = cached.as_ref().and_then(|t| t.refresh_token.clone()) {
            let token = self.refresh(&refresh)?;
            return token_access(token);
        }
        if let Some(code) = self.auth_code.clone() {
            let token = self.redeem_code(&code, HEADLESS_REDIRECT_URI)?;
            return token_access(token);
        }
        Err(IntakeError::MissingCredentials {
            path: self.token_path.clone(),
        })
    }

    /// One-time authorization. With a pre-obtained code configured, redeems
    /// it directly (headless). Otherwise prints the consent URL and waits
    /// for the redirect on a loopback listener.
    pub(crate) fn authorize(&self, bind: &str, port: u16) -> Result<()> {
        if let Some(code) = self.auth_code.clone() {
            self.redeem_code(&code, HEADLESS_REDIRECT_URI)?;
            println!("Stored token at {}", self.token_path.display());
            return Ok(());
        }

        let secrets = self.load_secrets()?;
        let redirect_uri = format!("http://{bind}:{port}/oauth/callback");
        let auth_url = build_auth_url(&secrets.client_id, &redirect_uri, DRIVE_SCOPE);
        println!("Open this URL to authorize:\n{auth_url}");

        let addr = format!("{bind}:{port}");
        let server = Server::http(&addr)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("server: {e}")))?;
        eprintln!("[auth] waiting for redirect on http://{addr}");

        for request in server.incoming_requests() {
            let url = request.url().to_string();
            if !url.starts_with("/oauth/callback") {
                let _ = request.respond(Response::from_string("ok"));
                continue;
            }
            let query = url.splitn(2, '?').nth(1).unwrap_or("");
            let params: HashMap<String, String> = form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect();
            let Some(code) = params.get("code").cloned() else {
                let _ = request.respond(Response::from_string("missing code"));
                continue;
            };
            self.exchange(&secrets, &code, &redirect_uri)?;
            let _ = request.respond(Response::from_string("Authorized. You can close this tab."));
            println!("Stored token at {}", self.token_path.display());
            break;
        }
        Ok(())
    }

    fn refresh(&self, refresh_token: &str) -> Result<TokenCache> {
        let secrets = self.load_secrets()?;
        let payload = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &secrets.client_id)
            .append_pair("client_secret", &secrets.client_secret)
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token)
            .finish();
        let resp = no_deadline_agent()
            .post(GOOGLE_TOKEN_URL)
            .set("content-type", "application/x-www-form-urlencoded")
            .send_string(&payload);
        let refreshed = response_json(resp, "token refresh")?;
        let token = cache_from_response(
            &refreshed,
            Some(refresh_token.to_string()),
            Utc::now().timestamp(),
        )?;
        save_token(&self.token_path, &token)?;
        Ok(token)
    }

    fn redeem_code(&self, code: &str, redirect_uri: &str) -> Result<TokenCache> {
        let secrets = self.load_secrets()?;
        self.exchange(&secrets, code, redirect_uri)
    }

    fn exchange(&self, secrets: &ClientSecrets, code: &str, redirect_uri: &str) -> Result<TokenCache> {
        let payload = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &secrets.client_id)
            .append_pair("client_secret", &secrets.client_secret)
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", code)
            .append_pair("redirect_uri", redirect_uri)
            .finish();
        let resp = no_deadline_agent()
            .post(GOOGLE_TOKEN_URL)
            .set("content-type", "application/x-www-form-urlencoded")
            .send_string(&payload);
        let exchanged = response_json(resp, "code exchange")?;
        let token = cache_from_response(&exchanged, None, Utc::now().timestamp())?;
        save_token(&self.token_path, &token)?;
        Ok(token)
    }

    fn load_secrets(&self) -> Result<ClientSecrets> {
        let data = fs::read_to_string(&self.credentials_path).map_err(|_| {
            IntakeError::MissingCredentials {
                path: self.credentials_path.clone(),
            }
        })?;
        let parsed: SecretsFile =
            serde_json::from_str(&data).map_err(|_| IntakeError::MissingCredentials {
                path: self.credentials_path.clone(),
            })?;
        parsed
            .installed
            .or(parsed.web)
            .ok_or_else(|| IntakeError::MissingCredentials {
                path: self.credentials_path.clone(),
            })
    }
}

fn token_access(token: TokenCache) -> Result<String> {
    token
        .access_token
        .ok_or_else(|| IntakeError::RemoteService {
            reason: "token endpoint returned no access_token".to_string(),
        })
}

pub(crate) fn build_auth_url(client_id: &str, redirect_uri: &str, scope: &str) -> String {
    format!(
        "{GOOGLE_AUTH_URL}?response_type=code&client_id={}&redirect_uri={}&scope={}&access_type=offline&prompt=consent",
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(scope),
    )
}

pub(crate) fn load_token(path: &Path) -> Option<TokenCache> {
    let data = fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

pub(crate) fn save_token(path: &Path, token: &TokenCache) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| IntakeError::io(e, parent))?;
        }
    }
    let json = serde_json::to_string_pretty(token).map_err(|e| IntakeError::RemoteService {
        reason: format!("encode token: {e}"),
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json).map_err(|e| IntakeError::io(e, &tmp))?;
    fs::rename(&tmp, path).map_err(|e| IntakeError::io(e, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LEDGER_FILENAME;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "intakeledger_auth_{}_{name}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_config(dir: &Path) -> AppConfig {
        AppConfig {
            data_dir: dir.to_path_buf(),
            credentials_path: dir.join("credentials.json"),
            token_path: dir.join("token.json"),
            auth_code: None,
            remote_folder: "Intake Ledger".to_string(),
            remote_name: LEDGER_FILENAME.to_string(),
        }
    }

    #[test]
    fn expiry_honors_slack() {
        let token = TokenCache {
            access_token: Some("t".to_string()),
            refresh_token: None,
            expires_at: Some(1_000),
        };
        assert!(!token_expired(&token, 900));
        assert!(token_expired(&token, 941));
        assert!(token_expired(&token, 1_000));
    }

    #[test]
    fn cache_without_expiry_is_trusted() {
        let token = TokenCache {
            access_token: Some("t".to_string()),
            refresh_token: None,
            expires_at: None,
        };
        assert!(!token_expired(&token, i64::MAX - EXPIRY_SLACK_SECS - 1));
    }

    #[test]
    fn refresh_response_carries_old_refresh_token_forward() {
        let payload = serde_json::json!({ "access_token": "new", "expires_in": 3600 });
        let token = cache_from_response(&payload, Some("keep-me".to_string()), 100).unwrap();
        assert_eq!(token.access_token.as_deref(), Some("new"));
        assert_eq!(token.refresh_token.as_deref(), Some("keep-me"));
        assert_eq!(token.expires_at, Some(3700));
    }

    #[test]
    fn response_refresh_token_wins_over_previous() {
        let payload =
            serde_json::json!({ "access_token": "new", "refresh_token": "fresh" });
        let token = cache_from_response(&payload, Some("old".to_string()), 0).unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("fresh"));
        assert_eq!(token.expires_at, None);
    }

    #[test]
    fn response_without_access_token_fails() {
        let payload = serde_json::json!({ "error": "invalid_grant" });
        assert!(cache_from_response(&payload, None, 0).is_err());
    }

    #[test]
    fn token_round_trips_through_disk() {
        let dir = temp_dir("roundtrip");
        let path = dir.join("token.json");
        let token = TokenCache {
            access_token: Some("a".to_string()),
            refresh_token: Some("r".to_string()),
            expires_at: Some(42),
        };
        save_token(&path, &token).unwrap();
        assert_eq!(load_token(&path), Some(token));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_material_fails_without_network() {
        let dir = temp_dir("missing");
        let provider = CredentialProvider::new(&test_config(&dir));
        let err = provider.access_token().unwrap_err();
        assert!(matches!(err, IntakeError::MissingCredentials { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn malformed_secrets_count_as_missing() {
        let dir = temp_dir("malformed");
        std::fs::write(dir.join("credentials.json"), "{}").unwrap();
        let provider = CredentialProvider::new(&test_config(&dir));
        let err = provider.load_secrets().unwrap_err();
        assert!(matches!(err, IntakeError::MissingCredentials { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn auth_url_encodes_parameters() {
        let url = build_auth_url("id with space", "http://127.0.0.1:8484/oauth/callback", DRIVE_SCOPE);
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=id%20with%20space"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains(&urlencoding::encode(DRIVE_SCOPE).into_owned()));
    }
}
