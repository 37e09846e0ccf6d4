//! Service-account OAuth for the Google APIs.
//!
//! A signed RS256 assertion is exchanged for a short-lived bearer token, which is cached
//! until shortly before it expires.

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sink::SinkUnavailableError;

/// Scopes needed to find a spreadsheet by name and append to it.
pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion. Google caps it at one hour.
const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account JSON key that signing needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, SinkUnavailableError> {
        serde_json::from_str(json)
            .map_err(|err| SinkUnavailableError::Credentials(format!("invalid key JSON: {err}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, SinkUnavailableError> {
        let json = std::fs::read_to_string(path).map_err(|err| {
            SinkUnavailableError::Credentials(format!("{}: {err}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME.as_secs()
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Hands out bearer tokens for one service account.
pub struct TokenProvider {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    client: Client,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(key: ServiceAccountKey, client: Client) -> Result<Self, SinkUnavailableError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|err| SinkUnavailableError::Credentials(format!("private key: {err}")))?;
        Ok(Self {
            key,
            signing_key,
            client,
            cache: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Returns a valid access token, fetching a new one when the cached token is stale.
    pub fn token(&self) -> Result<String, SinkUnavailableError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref()
            && Instant::now() < cached.expires_at
        {
            return Ok(cached.token.clone());
        }

        debug!(account = %self.key.client_email, "requesting access token");
        let assertion = self.assertion()?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .map_err(|err| SinkUnavailableError::Unreachable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(SinkUnavailableError::Credentials(format!(
                "token endpoint returned HTTP {}: {message}",
                status.as_u16()
            )));
        }
        let token: TokenResponse = response
            .json()
            .map_err(|err| SinkUnavailableError::InvalidResponse(err.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cache = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn assertion(&self) -> Result<String, SinkUnavailableError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| SinkUnavailableError::Credentials(err.to_string()))?
            .as_secs();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES.join(" "),
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME.as_secs(),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|err| SinkUnavailableError::Credentials(format!("signing: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(
            r#"{"type":"service_account","client_email":"bot@example.iam.gserviceaccount.com","private_key":"pem"}"#,
        )
        .expect("key");
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(key.private_key_id, None);
    }

    #[test]
    fn key_without_email_is_a_credentials_error() {
        let err = ServiceAccountKey::from_json(r#"{"private_key":"pem"}"#).expect_err("invalid");
        assert!(matches!(err, SinkUnavailableError::Credentials(_)));
    }

    #[test]
    fn garbage_private_key_is_rejected() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email":"bot@example.com","private_key":"not a pem"}"#,
        )
        .expect("key");
        let result = TokenProvider::new(key, Client::new());
        assert!(matches!(result, Err(SinkUnavailableError::Credentials(_))));
    }
}
