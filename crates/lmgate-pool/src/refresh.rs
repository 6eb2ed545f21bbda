use std::time::Duration;

use async_trait::async_trait;

use crate::credential::Credential;

/// Tokens are refreshed this long before their recorded expiry.
pub const REFRESH_SKEW: Duration = Duration::from_secs(60);

pub const REFRESH_BACKOFF_INITIAL: Duration = Duration::from_secs(30);
pub const REFRESH_BACKOFF_MAX: Duration = Duration::from_secs(3600);
/// Consecutive refresh failures before the account is retired.
pub const REFRESH_FAILURES_TO_RETIRE: u32 = 3;

#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds.
    pub expires_at: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("credential has no refresh token")]
    NoRefreshToken,
    #[error("token endpoint rejected the refresh: {0}")]
    Rejected(String),
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
}

/// Provider-specific OAuth refresh call. The pool serializes calls per
/// account; implementations only perform the HTTP exchange.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<RefreshedToken, RefreshError>;
}

/// Exponential refresh-failure backoff: 30s doubling to 1h.
pub fn refresh_backoff(consecutive_failures: u32) -> Duration {
    let exp = consecutive_failures.saturating_sub(1).min(8);
    let backoff = REFRESH_BACKOFF_INITIAL * 2u32.pow(exp);
    backoff.min(REFRESH_BACKOFF_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(refresh_backoff(1), Duration::from_secs(30));
        assert_eq!(refresh_backoff(2), Duration::from_secs(60));
        assert_eq!(refresh_backoff(3), Duration::from_secs(120));
        assert_eq!(refresh_backoff(10), Duration::from_secs(3600));
    }
}
