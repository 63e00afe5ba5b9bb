//! Gateway token issuer.
//!
//! Mints a short-lived EdDSA-signed JWT for every outbound gateway request.
//! Tokens are never cached: each call gets its own, so a leaked token is only
//! useful until its own expiry.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use infinigpt_config::{Audience, JwtConfig};
use infinigpt_core::{BotError, BotResult};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Claim names the issuer always sets itself; extra claims may not override them.
const RESERVED_CLAIMS: &[&str] = &["iss", "aud", "groups", "sub", "iat", "nbf", "exp"];

/// The payload of a gateway token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayClaims {
    pub iss: String,
    pub aud: Audience,
    pub groups: Vec<String>,
    /// The bot identity the request is made on behalf of.
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Anything that can mint a bearer token for a gateway call.
pub trait RequestSigner: Send + Sync {
    fn issue(&self, subject: &str) -> BotResult<String>;
}

pub struct TokenIssuer {
    key: EncodingKey,
    issuer: String,
    audience: Audience,
    groups: Vec<String>,
    ttl: Duration,
    extra: serde_json::Map<String, serde_json::Value>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("groups", &self.groups)
            .field("ttl_hours", &self.ttl.num_hours())
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Load the private key named in the config.
    ///
    /// A missing or unparseable key is a startup [`BotError::Config`].
    pub fn from_config(config: &JwtConfig) -> BotResult<Self> {
        let pem = read_key(&config.private_key_path)?;
        let issuer = Self::from_pem(&pem, config)?;
        info!(
            path = %config.private_key_path.display(),
            issuer = %config.issuer,
            "Loaded gateway signing key"
        );
        Ok(issuer)
    }

    /// Build an issuer from PKCS#8 Ed25519 PEM bytes.
    pub fn from_pem(pem: &[u8], config: &JwtConfig) -> BotResult<Self> {
        let key = EncodingKey::from_ed_pem(pem)
            .map_err(|e| BotError::Config(format!("invalid Ed25519 private key: {e}")))?;

        let extra = config
            .extra_claims
            .iter()
            .filter(|(k, _)| !RESERVED_CLAIMS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let ttl = Duration::try_hours(config.expiration_hours).ok_or_else(|| {
            BotError::Config(format!(
                "jwt.expirationHours out of range: {}",
                config.expiration_hours
            ))
        })?;

        Ok(Self {
            key,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            groups: config.groups.clone(),
            ttl,
            extra,
        })
    }

    /// Claims for a token issued to `subject` at `now`.
    ///
    /// Fails with [`BotError::Signing`] when the expiry is not representable.
    pub fn claims_at(&self, subject: &str, now: DateTime<Utc>) -> BotResult<GatewayClaims> {
        let exp = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| BotError::Signing("token expiry overflows the clock".into()))?;
        let iat = now.timestamp();
        Ok(GatewayClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            groups: self.groups.clone(),
            sub: subject.to_string(),
            iat,
            nbf: iat,
            exp: exp.timestamp(),
            extra: self.extra.clone(),
        })
    }

    /// Mint a signed token for one gateway call.
    pub fn issue(&self, subject: &str) -> BotResult<String> {
        let claims = self.claims_at(subject, Utc::now())?;
        let token = encode(&Header::new(Algorithm::EdDSA), &claims, &self.key)
            .map_err(|e| BotError::Signing(e.to_string()))?;
        debug!(sub = %subject, exp = claims.exp, "Issued gateway token");
        Ok(token)
    }
}

impl RequestSigner for TokenIssuer {
    fn issue(&self, subject: &str) -> BotResult<String> {
        TokenIssuer::issue(self, subject)
    }
}

fn read_key(path: &Path) -> BotResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        BotError::Config(format!("cannot read private key {}: {e}", path.display()))
    })
}
