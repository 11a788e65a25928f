//! ARM access tokens

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

/// Longest lifetime accepted from a token response (one year)
const MAX_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

/// A bearer token with its expiry
pub struct AccessToken {
    secret: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(raw: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: SecretString::from(raw.into()),
            expires_at,
        }
    }

    /// Token valid for `expires_in` seconds from now
    pub fn expiring_in(raw: impl Into<String>, expires_in: u64) -> Self {
        let lifetime = Duration::seconds(expires_in.min(MAX_LIFETIME_SECS) as i64);
        Self::new(raw, Utc::now() + lifetime)
    }

    /// Token supplied from outside with no known expiry
    pub fn non_expiring(raw: impl Into<String>) -> Self {
        Self::new(raw, DateTime::<Utc>::MAX_UTC)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True when the token expires within `secs` seconds
    pub fn expires_within(&self, secs: i64) -> bool {
        Utc::now() + Duration::seconds(secs) >= self.expires_at
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.secret.expose_secret())
    }

    pub(crate) fn duplicate(&self) -> Self {
        Self::new(self.secret.expose_secret().to_string(), self.expires_at)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
