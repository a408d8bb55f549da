use anyhow::{anyhow, Result};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::resource::normalize_author_name;
use crate::domain::viewer::Viewer;

const TOKEN_ISSUER: &str = "atlas";
const TOKEN_TYPE: &str = "session";
pub const MAX_DISPLAY_NAME_LEN: usize = 80;
pub const MAX_SESSION_TTL_HOURS: u64 = 24 * 365;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("display name must be at most {} characters", MAX_DISPLAY_NAME_LEN)]
    NameTooLong,
    #[error(transparent)]
    Token(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub viewer: Viewer,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Anonymous sessions: every sign-in mints a fresh viewer id carried inside
/// an encrypted token. Nothing is persisted.
#[derive(Clone)]
pub struct SessionService {
    key: [u8; 32],
    ttl_hours: u64,
}

impl SessionService {
    /// Lifetimes are clamped to one hour at least and one year at most.
    pub fn new(key: [u8; 32], ttl_hours: u64) -> Self {
        Self {
            key,
            ttl_hours: ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS),
        }
    }

    pub fn ttl_hours(&self) -> u64 {
        self.ttl_hours
    }

    pub fn sign_in(&self, display_name: Option<&str>) -> Result<IssuedSession, SessionError> {
        let display_name = normalize_author_name(display_name);
        if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(SessionError::NameTooLong);
        }

        let viewer = Viewer {
            id: Uuid::new_v4(),
            display_name,
        };
        let (claims, expires_at) = self.build_claims(&viewer)?;
        let key = SymmetricKey::<V4>::from(&self.key).map_err(|err| anyhow!(err))?;
        let token = local::encrypt(&key, &claims, None, None).map_err(|err| anyhow!(err))?;

        Ok(IssuedSession {
            viewer,
            token,
            expires_at,
        })
    }

    /// `None` for anything that is not a live token issued with our key.
    pub fn authenticate(&self, token: &str) -> Result<Option<Viewer>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, TOKEN_TYPE) {
            return Ok(None);
        }

        let id = claim_uuid(&claims, "sub")?;
        let display_name = claims
            .get_claim("name")
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| normalize_author_name(None));

        Ok(Some(Viewer { id, display_name }))
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }

    fn build_claims(&self, viewer: &Viewer) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.ttl_hours.saturating_mul(60 * 60));
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&viewer.id.to_string())?;
        claims.add_additional("typ", TOKEN_TYPE)?;
        claims.add_additional("name", viewer.display_name.as_str())?;
        let expires_at = OffsetDateTime::now_utc() + Duration::hours(i64::try_from(self.ttl_hours)?);
        Ok((claims, expires_at))
    }
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
