//! OAuth2 access tokens for the Google Cloud backends.
//!
//! Tokens come from a service-account key when one is configured, otherwise
//! from the GCE metadata server. A token is reused until shortly before it
//! expires.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

const SCOPES: &str = "https://www.googleapis.com/auth/devstorage.read_write \
                      https://www.googleapis.com/auth/datastore";

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Shared access-token source for GCS and Firestore.
pub struct GcpAuth {
    client: Client,
    credentials_file: Option<String>,
    token: RwLock<Option<CachedToken>>,
}

impl GcpAuth {
    /// Build the token source and fetch a first token so bad credentials fail at startup.
    pub async fn new(client: Client, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let auth = Self {
            client,
            credentials_file: credentials_file.map(|s| s.to_string()),
            token: RwLock::new(None),
        };
        auth.token().await?;
        Ok(auth)
    }

    /// Token source that has not fetched anything yet, for URL-building tests.
    #[cfg(test)]
    pub(crate) fn unauthenticated(client: Client) -> Self {
        Self {
            client,
            credentials_file: None,
            token: RwLock::new(None),
        }
    }

    /// A valid bearer token, refreshing it when close to expiry.
    pub async fn token(&self) -> Result<String, anyhow::Error> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| is_fresh(t, Utc::now())) {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.token.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some(token) = cached.as_ref().filter(|t| is_fresh(t, Utc::now())) {
            return Ok(token.value.clone());
        }

        let resp = if let Some(ref creds_path) = self.credentials_file {
            self.token_from_service_account(creds_path).await?
        } else {
            self.token_from_metadata_server().await?
        };

        tracing::debug!(expires_in = resp.expires_in, "Refreshed GCP access token");

        let value = resp.access_token;
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Utc::now() + Duration::seconds(resp.expires_in),
        });
        Ok(value)
    }

    async fn token_from_service_account(&self, path: &str) -> Result<TokenResponse, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;

        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": SCOPES,
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }

    async fn token_from_metadata_server(&self) -> Result<TokenResponse, anyhow::Error> {
        let resp: TokenResponse = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }
}

fn is_fresh(token: &CachedToken, now: DateTime<Utc>) -> bool {
    token.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    // PEM body -> DER
    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .map(str::trim)
        .collect();
    let der = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &der_b64)?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}
