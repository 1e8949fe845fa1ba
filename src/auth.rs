/// Bearer-token verification for externally-issued Firebase ID tokens.
///
/// Verification keys are fetched from Google's secure-token JWK endpoint
/// and cached until the expiry derived from the response's
/// `Cache-Control: max-age` directive. A missing or malformed
/// `Authorization` header rejects with 401; any verification failure
/// (signature, expiry, audience, issuer, subject) rejects with 403.
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::handlers::AppState;

/// Google's public JWK set for Firebase secure-token signatures.
const DEFAULT_KEYS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// One RSA verification key as published in the JWK set.
#[derive(Debug, Clone, Deserialize)]
struct JwkKey {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<JwkKey>,
}

/// Claims extracted from a verified Firebase ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseClaims {
    #[serde(default)]
    pub sub: String,
}

#[derive(Debug, Clone)]
struct CachedKeys {
    keys: HashMap<String, JwkKey>,
    expires_at: i64,
}

pub struct TokenVerifier {
    client: reqwest::Client,
    keys_url: String,
    project_id: String,
    cached_keys: RwLock<Option<CachedKeys>>,
}

impl TokenVerifier {
    pub fn new(project_id: String) -> Self {
        Self::with_keys_url(project_id, DEFAULT_KEYS_URL.to_string())
    }

    /// Constructor with an overridable key endpoint, used by tests to
    /// point at a mock server.
    pub fn with_keys_url(project_id: String, keys_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            keys_url,
            project_id,
            cached_keys: RwLock::new(None),
        }
    }

    /// Verifies a Firebase ID token: RS256 header with a known `kid`,
    /// signature against the published key, and `exp`/`aud`/`iss`/`sub`
    /// claims.
    pub async fn verify(&self, token: &str) -> Result<FirebaseClaims, AppError> {
        let header = decode_header(token)
            .map_err(|_| AppError::Forbidden("Malformed JWT".to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::Forbidden("Invalid JWT header".to_string()));
        }
        let kid = header
            .kid
            .ok_or_else(|| AppError::Forbidden("Invalid JWT header".to_string()))?;

        let keys = self.verification_keys().await?;
        let key = keys
            .get(&kid)
            .ok_or_else(|| AppError::Forbidden(format!("Unknown signing key: {}", kid)))?;

        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|e| AppError::Forbidden(format!("Unusable signing key: {}", e)))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            self.project_id
        )]);

        let token_data = decode::<FirebaseClaims>(token, &decoding_key, &validation)
            .map_err(|e| AppError::Forbidden(format!("JWT verification failed: {}", e)))?;

        if token_data.claims.sub.is_empty() {
            return Err(AppError::Forbidden("Invalid 'sub' claim".to_string()));
        }

        Ok(token_data.claims)
    }

    /// Returns the verification key set, refetching it once the cached
    /// copy passes its `max-age` expiry.
    async fn verification_keys(&self) -> Result<HashMap<String, JwkKey>, AppError> {
        {
            let cached = self.cached_keys.read().await;
            if let Some(cached) = cached.as_ref() {
                if Utc::now().timestamp() < cached.expires_at {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let mut cached = self.cached_keys.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(fresh) = cached.as_ref() {
            if Utc::now().timestamp() < fresh.expires_at {
                return Ok(fresh.keys.clone());
            }
        }

        tracing::debug!("Verification key cache empty or expired, fetching keys");
        let response = self
            .client
            .get(&self.keys_url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Key fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Key endpoint returned status {}",
                response.status()
            )));
        }

        let max_age = response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(parse_max_age)
            .unwrap_or(0);

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Invalid key set: {}", e)))?;

        let keys: HashMap<String, JwkKey> = jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::info!(
            "Fetched {} verification keys, valid for {}s",
            keys.len(),
            max_age
        );
        *cached = Some(CachedKeys {
            keys: keys.clone(),
            expires_at: Utc::now().timestamp() + max_age as i64,
        });

        Ok(keys)
    }
}

/// Seconds from a `Cache-Control` header's `max-age` directive, 0 when
/// absent or unparseable.
fn parse_max_age(cache_control: &str) -> u64 {
    for part in cache_control.split(',') {
        if let Some(value) = part.trim().strip_prefix("max-age=") {
            if let Ok(secs) = value.trim().parse() {
                return secs;
            }
        }
    }
    0
}

/// Pulls the token out of a `Bearer <token>` authorization header value.
fn extract_bearer(authorization: Option<&str>) -> Result<&str, AppError> {
    let authorization =
        authorization.ok_or_else(|| AppError::Unauthorized("Access token required".to_string()))?;

    let mut parts = authorization.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AppError::Unauthorized(
            "Invalid header format. Use 'Bearer <token>'".to_string(),
        )),
    }
}

/// Axum middleware protecting every route it wraps.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = extract_bearer(authorization)?;
    state.verifier.verify(token).await?;

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_max_age() {
        assert_eq!(parse_max_age("public, max-age=21600, must-revalidate"), 21600);
        assert_eq!(parse_max_age("max-age=300"), 300);
        assert_eq!(parse_max_age("no-store"), 0);
        assert_eq!(parse_max_age("max-age=abc"), 0);
        assert_eq!(parse_max_age(""), 0);
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc123")).unwrap(), "abc123");
        assert_eq!(extract_bearer(Some("bearer abc123")).unwrap(), "abc123");

        assert!(matches!(
            extract_bearer(None),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            extract_bearer(Some("Token abc123")),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            extract_bearer(Some("Bearer abc 123")),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            extract_bearer(Some("Bearer")),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_token_rejected_before_key_fetch() {
        let verifier = TokenVerifier::with_keys_url(
            "demo-project".to_string(),
            "http://127.0.0.1:0/unreachable".to_string(),
        );

        let result = verifier.verify("not-a-jwt").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
