use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lmgate_common::ProviderKind;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::credential::{Credential, CredentialState, UnavailableReason};
use crate::refresh::{
    refresh_backoff, RefreshError, TokenRefresher, REFRESH_FAILURES_TO_RETIRE, REFRESH_SKEW,
};
use crate::store::CredentialStore;

const RATE_LIMIT_FALLBACK: Duration = Duration::from_secs(30);
const QUOTA_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);
const AUTH_COOLDOWN: Duration = Duration::from_secs(30);
const UPSTREAM_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("no credentials configured for provider {0}")]
    ProviderUnknown(String),
    #[error("no usable credentials for provider {0}")]
    NoCredentials(String),
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),
}

/// How one executor call against a leased account ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    RateLimited { retry_after: Option<Duration> },
    /// Reported only after a forced refresh did not recover the account.
    AuthExpired,
    QuotaExhausted,
    /// Caller error; the account is fine.
    Invalid,
    Upstream,
}

#[derive(Debug, Default)]
struct EntryFlags {
    cooldown_until: Option<Instant>,
    reason: Option<UnavailableReason>,
    refresh_failures: u32,
    error_count: u32,
    retired: bool,
    used: bool,
}

#[derive(Debug)]
struct Entry {
    credential: RwLock<Credential>,
    flags: Mutex<EntryFlags>,
    /// Single-flight guard: concurrent refreshes of one account collapse
    /// into the first caller's exchange.
    refresh_gate: tokio::sync::Mutex<()>,
    inflight: AtomicU32,
}

impl Entry {
    fn usable(&self, now: Instant) -> bool {
        let flags = self.flags.lock().expect("entry flags poisoned");
        if flags.retired {
            return false;
        }
        match flags.cooldown_until {
            Some(until) => until <= now,
            None => true,
        }
    }

    fn cooldown(&self, duration: Duration, reason: UnavailableReason) {
        let mut flags = self.flags.lock().expect("entry flags poisoned");
        flags.cooldown_until = Some(Instant::now() + duration);
        flags.reason = Some(reason);
    }
}

struct ProviderSlot {
    entries: Vec<Arc<Entry>>,
    cursor: AtomicUsize,
}

/// Exclusive use of one credential while a request is in flight.
pub struct Lease {
    entry: Arc<Entry>,
    credential: Credential,
}

impl Lease {
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn credential_id(&self) -> &str {
        &self.credential.id
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.entry.inflight.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Per-provider rotating pools of authenticated accounts.
pub struct CredentialPool {
    providers: RwLock<HashMap<ProviderKind, ProviderSlot>>,
    store: Option<Arc<CredentialStore>>,
    max_retry_interval: Duration,
}

impl CredentialPool {
    pub fn new(max_retry_interval: Duration) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            store: None,
            max_retry_interval,
        }
    }

    /// Pool that rewrites the account's JSON file after each refresh.
    pub fn with_store(max_retry_interval: Duration, store: Arc<CredentialStore>) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            store: Some(store),
            max_retry_interval,
        }
    }

    pub async fn insert(&self, credential: Credential) {
        let entry = Arc::new(Entry {
            credential: RwLock::new(credential.clone()),
            flags: Mutex::new(EntryFlags::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
            inflight: AtomicU32::new(0),
        });
        let mut providers = self.providers.write().await;
        let slot = providers
            .entry(credential.provider.clone())
            .or_insert_with(|| ProviderSlot {
                entries: Vec::new(),
                cursor: AtomicUsize::new(0),
            });
        slot.entries.retain(|existing| {
            // Replacing a reloaded account keeps the newest credential.
            entry_id(existing) != credential.id
        });
        slot.entries.push(entry);
    }

    pub async fn remove_provider(&self, provider: &ProviderKind) {
        self.providers.write().await.remove(provider);
    }

    pub async fn len(&self, provider: &ProviderKind) -> usize {
        self.providers
            .read()
            .await
            .get(provider)
            .map(|slot| slot.entries.len())
            .unwrap_or(0)
    }

    /// Round-robin selection skipping cooled-down and retired entries.
    ///
    /// When every entry is cooling down the call waits for the earliest
    /// recovery, unless that wait exceeds `max-retry-interval`.
    pub async fn acquire(&self, provider: &ProviderKind) -> Result<Lease, PoolError> {
        loop {
            let (entries, start) = {
                let providers = self.providers.read().await;
                let Some(slot) = providers.get(provider) else {
                    return Err(PoolError::ProviderUnknown(provider.to_string()));
                };
                if slot.entries.is_empty() {
                    return Err(PoolError::NoCredentials(provider.to_string()));
                }
                (
                    slot.entries.clone(),
                    slot.cursor.fetch_add(1, Ordering::Relaxed),
                )
            };

            let now = Instant::now();
            let count = entries.len();
            let chosen = (0..count)
                .map(|offset| &entries[(start + offset) % count])
                .find(|entry| entry.usable(now));

            if let Some(entry) = chosen {
                entry.inflight.fetch_add(1, Ordering::Relaxed);
                {
                    let mut flags = entry.flags.lock().expect("entry flags poisoned");
                    flags.used = true;
                }
                let credential = entry.credential.read().await.clone();
                return Ok(Lease {
                    entry: entry.clone(),
                    credential,
                });
            }

            let earliest = entries
                .iter()
                .filter_map(|entry| {
                    let flags = entry.flags.lock().expect("entry flags poisoned");
                    if flags.retired {
                        None
                    } else {
                        flags.cooldown_until
                    }
                })
                .min();
            let Some(earliest) = earliest else {
                return Err(PoolError::NoCredentials(provider.to_string()));
            };
            let wait = earliest.saturating_duration_since(now);
            if wait > self.max_retry_interval {
                return Err(PoolError::NoCredentials(provider.to_string()));
            }
            tracing::debug!(provider = %provider, wait_ms = wait.as_millis() as u64, "all credentials cooling down; waiting");
            tokio::time::sleep_until(earliest).await;
        }
    }

    /// Refreshes the leased account when its token is within the expiry
    /// skew. Concurrent callers wait on the same single-flight exchange.
    pub async fn ensure_fresh(
        &self,
        lease: &Lease,
        refresher: &dyn TokenRefresher,
    ) -> Result<Credential, PoolError> {
        let current = lease.entry.credential.read().await.clone();
        if !needs_refresh(&current) {
            return Ok(current);
        }
        self.refresh_locked(lease, refresher, false).await
    }

    /// Unconditional refresh (401 recovery path). Serialized per account.
    pub async fn refresh_now(
        &self,
        lease: &Lease,
        refresher: &dyn TokenRefresher,
    ) -> Result<Credential, PoolError> {
        self.refresh_locked(lease, refresher, true).await
    }

    async fn refresh_locked(
        &self,
        lease: &Lease,
        refresher: &dyn TokenRefresher,
        force: bool,
    ) -> Result<Credential, PoolError> {
        let _gate = lease.entry.refresh_gate.lock().await;

        // A waiter that queued behind an in-flight refresh finds a fresh
        // token here and skips its own exchange.
        let current = lease.entry.credential.read().await.clone();
        if force {
            if current.access_token != lease.credential.access_token {
                return Ok(current);
            }
        } else if !needs_refresh(&current) {
            return Ok(current);
        }

        if current.refresh_token.is_none() {
            return Err(PoolError::RefreshFailed(RefreshError::NoRefreshToken));
        }

        match refresher.refresh(&current).await {
            Ok(token) => {
                let mut credential = lease.entry.credential.write().await;
                credential.access_token = Some(token.access_token);
                if token.refresh_token.is_some() {
                    credential.refresh_token = token.refresh_token;
                }
                credential.expires_at = token.expires_at;
                let updated = credential.clone();
                drop(credential);

                {
                    let mut flags = lease.entry.flags.lock().expect("entry flags poisoned");
                    flags.refresh_failures = 0;
                }
                if let Some(store) = &self.store {
                    if let Err(err) = store.save(&updated) {
                        tracing::warn!(credential = %updated.id, error = %err, "failed to persist refreshed credential");
                    }
                }
                Ok(updated)
            }
            Err(err) => {
                let mut flags = lease.entry.flags.lock().expect("entry flags poisoned");
                flags.refresh_failures += 1;
                if flags.refresh_failures >= REFRESH_FAILURES_TO_RETIRE {
                    flags.retired = true;
                    tracing::warn!(credential = %current.id, "retiring credential after repeated refresh failures");
                } else {
                    let backoff = refresh_backoff(flags.refresh_failures);
                    flags.cooldown_until = Some(Instant::now() + backoff);
                    flags.reason = Some(UnavailableReason::RefreshFailed);
                }
                Err(PoolError::RefreshFailed(err))
            }
        }
    }

    /// Feedback from the executor after the upstream call finished.
    pub fn report(&self, lease: &Lease, outcome: Outcome) {
        match outcome {
            Outcome::Ok => {
                let mut flags = lease.entry.flags.lock().expect("entry flags poisoned");
                flags.error_count = 0;
            }
            Outcome::RateLimited { retry_after } => {
                lease.entry.cooldown(
                    retry_after.unwrap_or(RATE_LIMIT_FALLBACK),
                    UnavailableReason::RateLimit,
                );
            }
            Outcome::AuthExpired => {
                lease
                    .entry
                    .cooldown(AUTH_COOLDOWN, UnavailableReason::AuthExpired);
            }
            Outcome::QuotaExhausted => {
                lease
                    .entry
                    .cooldown(QUOTA_COOLDOWN, UnavailableReason::QuotaExhausted);
            }
            Outcome::Invalid => {}
            Outcome::Upstream => {
                let mut flags = lease.entry.flags.lock().expect("entry flags poisoned");
                flags.error_count += 1;
                drop(flags);
                lease
                    .entry
                    .cooldown(UPSTREAM_COOLDOWN, UnavailableReason::Upstream);
            }
        }
    }

    pub async fn state(&self, provider: &ProviderKind, id: &str) -> Option<CredentialState> {
        let providers = self.providers.read().await;
        let slot = providers.get(provider)?;
        for entry in &slot.entries {
            if entry.credential.read().await.id != id {
                continue;
            }
            let flags = entry.flags.lock().expect("entry flags poisoned");
            if flags.retired {
                return Some(CredentialState::Retired);
            }
            if let Some(until) = flags.cooldown_until {
                if until > Instant::now() {
                    return Some(CredentialState::CoolingDown {
                        until,
                        reason: flags.reason.unwrap_or(UnavailableReason::Upstream),
                    });
                }
            }
            return Some(if flags.used {
                CredentialState::Usable
            } else {
                CredentialState::Fresh
            });
        }
        None
    }
}

fn needs_refresh(credential: &Credential) -> bool {
    let Some(expires_at) = credential.expires_at else {
        return false;
    };
    if credential.refresh_token.is_none() {
        return false;
    }
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    expires_at - now < REFRESH_SKEW.as_secs() as i64
}

fn entry_id(entry: &Arc<Entry>) -> String {
    entry
        .credential
        .try_read()
        .map(|credential| credential.id.clone())
        .unwrap_or_default()
}
