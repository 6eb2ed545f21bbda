use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lmgate_common::ProviderKind;
use lmgate_pool::{
    Credential, CredentialPool, CredentialState, Outcome, PoolError, RefreshError, RefreshedToken,
    TokenRefresher,
};

fn api_key(id: &str) -> Credential {
    Credential::api_key(ProviderKind::GeminiCli, id, format!("key-{id}"))
}

async fn pool_with(ids: &[&str]) -> CredentialPool {
    let pool = CredentialPool::new(Duration::from_secs(30));
    for id in ids {
        pool.insert(api_key(id)).await;
    }
    pool
}

#[tokio::test]
async fn rotation_is_fair_over_healthy_accounts() {
    let pool = pool_with(&["a", "b", "c"]).await;
    let mut counts = std::collections::HashMap::new();
    for _ in 0..9 {
        let lease = pool.acquire(&ProviderKind::GeminiCli).await.unwrap();
        *counts.entry(lease.credential_id().to_string()).or_insert(0) += 1;
        pool.report(&lease, Outcome::Ok);
    }
    // Over N requests against k healthy accounts no account exceeds
    // ceil(N/k) + 1.
    for (id, count) in counts {
        assert!(count <= 4, "account {id} used {count} times");
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_account_is_bypassed_until_retry_after() {
    let pool = pool_with(&["a", "b"]).await;

    // First lease lands on "a" and reports a 429 with Retry-After: 5.
    let lease = pool.acquire(&ProviderKind::GeminiCli).await.unwrap();
    assert_eq!(lease.credential_id(), "a");
    pool.report(
        &lease,
        Outcome::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        },
    );
    drop(lease);

    // Within the window every acquisition bypasses "a".
    for _ in 0..3 {
        let lease = pool.acquire(&ProviderKind::GeminiCli).await.unwrap();
        assert_eq!(lease.credential_id(), "b");
    }

    tokio::time::advance(Duration::from_secs(6)).await;
    let mut seen_a = false;
    for _ in 0..2 {
        let lease = pool.acquire(&ProviderKind::GeminiCli).await.unwrap();
        seen_a |= lease.credential_id() == "a";
    }
    assert!(seen_a, "account a should be eligible again after 5s");
}

#[tokio::test(start_paused = true)]
async fn acquire_waits_for_earliest_recovery() {
    let pool = pool_with(&["a"]).await;
    let lease = pool.acquire(&ProviderKind::GeminiCli).await.unwrap();
    pool.report(
        &lease,
        Outcome::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        },
    );
    drop(lease);

    let lease = pool.acquire(&ProviderKind::GeminiCli).await.unwrap();
    assert_eq!(lease.credential_id(), "a");
}

#[tokio::test(start_paused = true)]
async fn acquire_fails_when_wait_exceeds_max_retry_interval() {
    let pool = CredentialPool::new(Duration::from_secs(10));
    pool.insert(api_key("a")).await;
    let lease = pool.acquire(&ProviderKind::GeminiCli).await.unwrap();
    pool.report(&lease, Outcome::QuotaExhausted);
    drop(lease);

    let err = pool.acquire(&ProviderKind::GeminiCli).await.unwrap_err();
    assert!(matches!(err, PoolError::NoCredentials(_)));
}

struct CountingRefresher {
    calls: AtomicU32,
    delay: Duration,
    fail: bool,
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self, _credential: &Credential) -> Result<RefreshedToken, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(RefreshError::Rejected("invalid_grant".to_string()));
        }
        Ok(RefreshedToken {
            access_token: "fresh-token".to_string(),
            refresh_token: None,
            expires_at: Some(time::OffsetDateTime::now_utc().unix_timestamp() + 3600),
        })
    }
}

fn expiring_credential(id: &str) -> Credential {
    Credential::oauth(
        ProviderKind::GeminiCli,
        id,
        "stale-token",
        Some("refresh-token".to_string()),
        // Inside the 60s refresh skew.
        Some(time::OffsetDateTime::now_utc().unix_timestamp() + 10),
    )
}

#[tokio::test(start_paused = true)]
async fn concurrent_acquisitions_share_one_refresh() {
    let pool = Arc::new(CredentialPool::new(Duration::from_secs(30)));
    pool.insert(expiring_credential("a")).await;
    let refresher = Arc::new(CountingRefresher {
        calls: AtomicU32::new(0),
        delay: Duration::from_millis(50),
        fail: false,
    });

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let pool = pool.clone();
        let refresher = refresher.clone();
        tasks.push(tokio::spawn(async move {
            let lease = pool.acquire(&ProviderKind::GeminiCli).await.unwrap();
            let credential = pool.ensure_fresh(&lease, refresher.as_ref()).await.unwrap();
            assert_eq!(credential.access_token.as_deref(), Some("fresh-token"));
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn three_refresh_failures_retire_the_account() {
    let pool = CredentialPool::new(Duration::from_secs(30));
    pool.insert(expiring_credential("a")).await;
    let refresher = CountingRefresher {
        calls: AtomicU32::new(0),
        delay: Duration::from_millis(1),
        fail: true,
    };

    for _ in 0..3 {
        let lease = pool.acquire(&ProviderKind::GeminiCli).await.unwrap();
        let err = pool.refresh_now(&lease, &refresher).await.unwrap_err();
        assert!(matches!(err, PoolError::RefreshFailed(_)));
        drop(lease);
        // Skip past the refresh-failure cooldown so acquire sees the
        // account again until it is finally retired.
        tokio::time::advance(Duration::from_secs(3600)).await;
    }

    let state = pool.state(&ProviderKind::GeminiCli, "a").await.unwrap();
    assert_eq!(state, CredentialState::Retired);
    let err = pool.acquire(&ProviderKind::GeminiCli).await.unwrap_err();
    assert!(matches!(err, PoolError::NoCredentials(_)));
}

#[tokio::test]
async fn unknown_provider_is_reported_as_such() {
    let pool = CredentialPool::new(Duration::from_secs(30));
    let err = pool.acquire(&ProviderKind::Codex).await.unwrap_err();
    assert!(matches!(err, PoolError::ProviderUnknown(_)));
}
