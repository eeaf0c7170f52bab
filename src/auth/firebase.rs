// ABOUTME: Firebase ID token verification against Google's rotating signing certificates
// ABOUTME: Caches the certificate keys per Cache-Control max-age and maps claims to an identity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Firebase Authentication token validation
//!
//! - RS256 signatures checked against Google's X.509 certificates
//! - Certificates cached for the `Cache-Control: max-age` of the key response
//!   (never less than five minutes)
//! - Issuer must be `https://securetoken.google.com/<project-id>` and audience
//!   the project id
//! - Tokens without an email claim are rejected

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parley_core::models::VerifiedIdentity;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use x509_parser::prelude::*;

use super::TokenVerifier;
use crate::config::FirebaseConfig;
use crate::errors::{AppError, AppResult};

/// Google's Firebase signing certificate endpoint
const FIREBASE_CERTS_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Minimum certificate cache TTL (5 minutes)
const MIN_CACHE_TTL_SECS: i64 = 300;

/// Maximum certificate cache TTL (1 day)
const MAX_CACHE_TTL_SECS: i64 = 86_400;

const KEY_SERVICE: &str = "Firebase key endpoint";

struct CachedKeys {
    /// Key ID to PEM-encoded public key
    keys: HashMap<String, String>,
    expires_at: DateTime<Utc>,
}

/// Claims carried by a Firebase ID token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseClaims {
    /// Issuer
    pub iss: String,
    /// Audience (the project id)
    pub aud: String,
    /// Firebase user uid
    pub sub: String,
    /// Issued at
    pub iat: i64,
    /// Expiry
    pub exp: i64,
    /// Email address
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Profile picture URL
    pub picture: Option<String>,
    /// Firebase-specific claims
    #[serde(default)]
    pub firebase: FirebaseSpecificClaims,
}

/// The nested `firebase` claim
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FirebaseSpecificClaims {
    /// Sign-in provider (e.g. `google.com`, `password`)
    pub sign_in_provider: Option<String>,
}

impl FirebaseClaims {
    /// Convert verified claims into the identity the sync service consumes
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` when the token carries no email
    pub fn into_identity(self) -> AppResult<VerifiedIdentity> {
        let email = self
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::auth_invalid("Token has no email address"))?;

        Ok(VerifiedIdentity {
            external_id: self.sub,
            email,
            display_name: self.name,
            avatar_url: self.picture,
            provider: self.firebase.sign_in_provider,
        })
    }
}

/// Firebase token verifier with a shared certificate cache
pub struct FirebaseAuth {
    config: FirebaseConfig,
    http_client: Client,
    cached_keys: Arc<RwLock<Option<CachedKeys>>>,
}

impl FirebaseAuth {
    /// Create a verifier for the configured project
    #[must_use]
    pub fn new(config: FirebaseConfig) -> Self {
        Self {
            config,
            http_client: Client::new(),
            cached_keys: Arc::new(RwLock::new(None)),
        }
    }

    /// Whether a project id is configured and verification is enabled
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Validate a Firebase ID token and return its claims
    ///
    /// # Errors
    ///
    /// - configuration error when no project id is configured
    /// - `AuthInvalid` for malformed tokens, unknown key ids, bad signatures,
    ///   wrong issuer or audience
    /// - `AuthExpired` for expired tokens
    /// - external service error when the signing keys cannot be fetched
    pub async fn validate_token(&self, token: &str) -> AppResult<FirebaseClaims> {
        let project_id = match self.config.project_id.as_deref() {
            Some(id) if self.config.enabled => id,
            _ => return Err(AppError::config("Firebase authentication is not configured")),
        };

        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode Firebase token header");
            AppError::auth_invalid("Invalid token format")
        })?;

        let kid = header.kid.ok_or_else(|| {
            debug!("Firebase token missing key ID (kid) in header");
            AppError::auth_invalid("Token missing key ID")
        })?;

        let pem_key = self.get_public_key(&kid).await?;
        let decoding_key = DecodingKey::from_rsa_pem(pem_key.as_bytes()).map_err(|e| {
            warn!(error = %e, kid = %kid, "Failed to create decoding key from PEM");
            AppError::internal("Invalid Firebase signing key").with_source(e)
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[project_id]);
        validation.set_issuer(&[format!("{FIREBASE_ISSUER_PREFIX}{project_id}")]);

        let token_data =
            decode::<FirebaseClaims>(token, &decoding_key, &validation).map_err(|e| {
                debug!(error = %e, "Firebase token validation failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::auth_expired(),
                    ErrorKind::InvalidAudience => AppError::auth_invalid("Invalid token audience"),
                    ErrorKind::InvalidIssuer => AppError::auth_invalid("Invalid token issuer"),
                    _ => AppError::auth_invalid("Invalid token"),
                }
            })?;

        debug!(uid = %token_data.claims.sub, "Firebase token validated");
        Ok(token_data.claims)
    }

    async fn get_public_key(&self, kid: &str) -> AppResult<String> {
        if let Some(key) = self.try_get_cached_key(kid).await {
            return Ok(key);
        }

        self.refresh_keys().await?;

        let cache = self.cached_keys.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| {
                debug!(kid = %kid, "Firebase public key not found for kid");
                AppError::auth_invalid("Unknown token signing key")
            })
    }

    async fn try_get_cached_key(&self, kid: &str) -> Option<String> {
        let cache = self.cached_keys.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.expires_at > Utc::now())
            .and_then(|cached| cached.keys.get(kid).cloned())
    }

    async fn refresh_keys(&self) -> AppResult<()> {
        info!("Fetching Firebase public keys from Google");

        let (certs, cache_ttl) = self.fetch_google_certificates().await?;
        let keys = convert_certs_to_keys(certs)?;
        let expires_at = Utc::now() + Duration::seconds(cache_ttl);

        info!(
            num_keys = keys.len(),
            cache_ttl_secs = cache_ttl,
            "Firebase public keys cached"
        );

        *self.cached_keys.write().await = Some(CachedKeys { keys, expires_at });
        Ok(())
    }

    async fn fetch_google_certificates(&self) -> AppResult<(HashMap<String, String>, i64)> {
        let response = self
            .http_client
            .get(FIREBASE_CERTS_URL)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                warn!(error = %e, "Failed to fetch Firebase public keys");
                AppError::external_service(KEY_SERVICE, "failed to fetch signing keys")
                    .with_source(e)
            })?;

        let default_ttl =
            i64::try_from(self.config.key_cache_ttl_secs).unwrap_or(MAX_CACHE_TTL_SECS);
        let cache_ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(default_ttl)
            .clamp(MIN_CACHE_TTL_SECS, MAX_CACHE_TTL_SECS);

        let certs: HashMap<String, String> = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse Firebase public keys response");
            AppError::external_service(KEY_SERVICE, "malformed signing key response")
                .with_source(e)
        })?;

        Ok((certs, cache_ttl))
    }
}

#[async_trait]
impl TokenVerifier for FirebaseAuth {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        self.validate_token(token).await?.into_identity()
    }
}

fn convert_certs_to_keys(certs: HashMap<String, String>) -> AppResult<HashMap<String, String>> {
    let mut keys = HashMap::with_capacity(certs.len());
    for (kid, cert_pem) in certs {
        match extract_public_key_from_cert(&cert_pem) {
            Ok(public_key_pem) => {
                keys.insert(kid, public_key_pem);
            }
            Err(e) => {
                warn!(kid = %kid, error = %e, "Failed to extract public key from certificate");
            }
        }
    }

    if keys.is_empty() {
        return Err(AppError::external_service(
            KEY_SERVICE,
            "no valid signing keys found",
        ));
    }

    Ok(keys)
}

/// Parse the max-age directive of a Cache-Control header
///
/// Example: "public, max-age=3600, must-revalidate" -> 3600
fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|s| s.strip_prefix("max-age="))
        .and_then(|s| s.parse().ok())
}

/// Re-encode the certificate's subject public key info as a PEM public key
fn extract_public_key_from_cert(cert_pem: &str) -> AppResult<String> {
    let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| AppError::internal(format!("Failed to parse X.509 PEM: {e}")))?;

    let (_, cert) = X509Certificate::from_der(&pem.contents)
        .map_err(|e| AppError::internal(format!("Failed to parse X.509 certificate: {e}")))?;

    let encoded = STANDARD.encode(cert.public_key().raw);
    let body = encoded
        .as_bytes()
        .chunks(64)
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "-----BEGIN PUBLIC KEY-----\n{body}\n-----END PUBLIC KEY-----"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    fn claims(email: Option<&str>) -> FirebaseClaims {
        FirebaseClaims {
            iss: format!("{FIREBASE_ISSUER_PREFIX}demo"),
            aud: "demo".to_owned(),
            sub: "uid-123".to_owned(),
            iat: 0,
            exp: 0,
            email: email.map(str::to_owned),
            name: Some("Ada".to_owned()),
            picture: None,
            firebase: FirebaseSpecificClaims {
                sign_in_provider: Some("google.com".to_owned()),
            },
        }
    }

    #[test]
    fn test_parse_max_age() {
        assert_eq!(
            parse_max_age("public, max-age=19302, must-revalidate, no-transform"),
            Some(19302)
        );
        assert_eq!(parse_max_age("max-age=60"), Some(60));
        assert_eq!(parse_max_age("no-cache"), None);
        assert_eq!(parse_max_age("max-age=soon"), None);
    }

    #[test]
    fn test_claims_into_identity() {
        let identity = claims(Some("ada@example.com")).into_identity().unwrap();
        assert_eq!(identity.external_id, "uid-123");
        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
        assert_eq!(identity.provider.as_deref(), Some("google.com"));
    }

    #[test]
    fn test_claims_without_email_rejected() {
        let err = claims(None).into_identity().unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
        let err = claims(Some("  ")).into_identity().unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
    }

    #[tokio::test]
    async fn test_unconfigured_verifier_is_config_error() {
        let auth = FirebaseAuth::new(FirebaseConfig::default());
        assert!(!auth.is_enabled());
        let err = auth.verify("a.b.c").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }

    #[tokio::test]
    async fn test_malformed_token_rejected_before_key_fetch() {
        let auth = FirebaseAuth::new(FirebaseConfig {
            project_id: Some("demo".to_owned()),
            enabled: true,
            key_cache_ttl_secs: 3600,
        });
        let err = auth.verify("not-a-jwt").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
    }
}
