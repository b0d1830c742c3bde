//! OAuth access tokens for the Cloud Logging API.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const LOGGING_READ_SCOPE: &str = "https://www.googleapis.com/auth/logging.read";
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid service account credentials: {0}")]
    Credentials(String),
    #[error("Failed to read credentials file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to sign token assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

pub struct ServiceAccount {
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    key: EncodingKey,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Where access tokens come from, resolved once when the client is built.
pub enum TokenSource {
    /// Pre-issued token, used as is.
    Static(String),
    ServiceAccount(ServiceAccount),
    /// GCE / GKE metadata server default credentials.
    Metadata { url: String },
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("TokenSource::Static(..)"),
            TokenSource::ServiceAccount(sa) => {
                write!(f, "TokenSource::ServiceAccount({})", sa.client_email)
            }
            TokenSource::Metadata { url } => write!(f, "TokenSource::Metadata({})", url),
        }
    }
}

impl TokenSource {
    /// Parse service-account credentials given as a file path or inline JSON.
    ///
    /// The value is treated as a path first; when no such file exists it is
    /// parsed as the key JSON itself.
    pub fn from_credentials(credentials: &str) -> Result<Self, AuthError> {
        let path = Path::new(credentials);
        let json = if path.is_file() {
            std::fs::read_to_string(path)?
        } else {
            credentials.to_string()
        };

        let key: ServiceAccountKey = serde_json::from_str(&json)
            .map_err(|e| AuthError::Credentials(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;

        Ok(TokenSource::ServiceAccount(ServiceAccount {
            client_email: key.client_email,
            key_id: key.private_key_id,
            token_uri: key.token_uri,
            key: encoding_key,
        }))
    }

    pub fn metadata() -> Self {
        TokenSource::Metadata {
            url: METADATA_TOKEN_URL.to_string(),
        }
    }

    pub async fn access_token(&self, client: &Client) -> Result<String, AuthError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(account) => {
                let assertion = account.signed_assertion()?;
                debug!(client_email = %account.client_email, "Exchanging service account assertion");
                let response = client
                    .post(&account.token_uri)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
                    .send()
                    .await?;
                read_token(response).await
            }
            TokenSource::Metadata { url } => {
                debug!("Requesting access token from metadata server");
                let response = client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?;
                read_token(response).await
            }
        }
    }
}

impl ServiceAccount {
    fn signed_assertion(&self) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: LOGGING_READ_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        Ok(encode(&header, &claims, &self.key)?)
    }
}

async fn read_token(response: reqwest::Response) -> Result<String, AuthError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AuthError::Status { status, body });
    }
    let token: TokenResponse = response.json().await?;
    Ok(token.access_token)
}
