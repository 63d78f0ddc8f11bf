//! Payment reconciliation after returning from checkout
//!
//! When the browser comes back from the hosted checkout page the URL carries
//! a success marker. The dashboard then confirms the payment with the backend
//! exactly once, refreshes the affected state, and hands back a URL without
//! the marker so a reload cannot fire the sync again.
//!
//! ## Ordering
//!
//! 1. detect the marker
//! 2. move the guard `Idle -> Syncing` (synchronously, before any await)
//! 3. call the sync endpoint
//! 4. refetch dependent state (caller)
//! 5. clear the marker from the URL
//!
//! A failed sync is not rolled back to `Idle`: the payment webhook is
//! expected to reconcile eventually and the backend sync call is idempotent.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use url::form_urlencoded;

/// Default time a finished guard keeps swallowing repeated markers
pub const DEFAULT_GUARD_TTL: Duration = Duration::from_secs(60);

/// Upper bound on tracked guards
pub const MAX_GUARDS: usize = 10_000;

/// Query-string marker appended by the checkout success URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnMarker {
    /// `payment=success` (request and managed-service pages)
    PaymentSuccess,
    /// `topUp=success` (billing page)
    TopUpSuccess,
}

impl ReturnMarker {
    pub fn param(&self) -> (&'static str, &'static str) {
        match self {
            ReturnMarker::PaymentSuccess => ("payment", "success"),
            ReturnMarker::TopUpSuccess => ("topUp", "success"),
        }
    }

    /// Whether a raw query string carries this marker
    pub fn is_present(&self, query: Option<&str>) -> bool {
        let (key, value) = self.param();
        query
            .map(|q| form_urlencoded::parse(q.as_bytes()).any(|(k, v)| k == key && v == value))
            .unwrap_or(false)
    }

    /// Rebuild `path?query` without the marker parameter
    pub fn strip(&self, path: &str, query: Option<&str>) -> String {
        let (key, value) = self.param();
        let remaining: Vec<(String, String)> = query
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .filter(|(k, v)| !(k == key && v == value))
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        if remaining.is_empty() {
            return path.to_string();
        }

        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(remaining)
            .finish();
        format!("{}?{}", path, query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
    Synced,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    Begin,
    Succeeded,
    Failed,
    /// Re-arm a finished guard once its hold time has passed
    Reset,
}

impl SyncState {
    /// Transition table; `None` means the event is refused in this state
    pub fn next(self, event: SyncEvent) -> Option<SyncState> {
        use SyncEvent as E;
        use SyncState as S;

        match (self, event) {
            (S::Idle, E::Begin) => Some(S::Syncing),
            (S::Syncing, E::Succeeded) => Some(S::Synced),
            (S::Syncing, E::Failed) => Some(S::Failed),
            (S::Synced, E::Reset) | (S::Failed, E::Reset) => Some(S::Idle),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SyncState::Synced | SyncState::Failed)
    }
}

#[derive(Debug)]
struct GuardInner {
    state: SyncState,
    finished_at: Option<Instant>,
}

/// Single-fire guard for one reconciliation target
#[derive(Debug)]
pub struct SyncGuard {
    inner: Mutex<GuardInner>,
}

impl Default for SyncGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncGuard {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GuardInner {
                state: SyncState::Idle,
                finished_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GuardInner> {
        // A panic elsewhere cannot leave the state half-written
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn state(&self) -> SyncState {
        self.lock().state
    }

    /// Apply an event; returns false (and changes nothing) if refused
    pub fn fire(&self, event: SyncEvent) -> bool {
        let mut inner = self.lock();
        match inner.state.next(event) {
            Some(next) => {
                inner.state = next;
                inner.finished_at = next.is_finished().then(Instant::now);
                true
            }
            None => false,
        }
    }

    /// Finished and older than `ttl`
    fn is_stale(&self, ttl: Duration) -> bool {
        let inner = self.lock();
        inner.state.is_finished() && inner.finished_at.is_some_and(|t| t.elapsed() >= ttl)
    }
}

/// How a failed sync is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// The user just came back from paying for something specific; tell them
    Foreground,
    /// Automatic sync; log only, the webhook will catch up
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Non-blocking notification for the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum ReconcileOutcome<T> {
    /// Another render already fired (or recently finished) this sync
    Skipped,
    Synced(T),
    /// Sync failed; `notice` is set only in foreground mode
    Failed { notice: Option<Notice> },
}

impl<T> ReconcileOutcome<T> {
    pub fn is_synced(&self) -> bool {
        matches!(self, ReconcileOutcome::Synced(_))
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            ReconcileOutcome::Failed { notice } => notice.as_ref(),
            _ => None,
        }
    }
}

/// Run one sync under `guard`.
///
/// `sync` is only polled after the guard moved to `Syncing`, so a second
/// caller racing on the same guard sees `Skipped` and never issues the call.
pub async fn reconcile<T, E, Fut>(
    guard: &SyncGuard,
    mode: SyncMode,
    failure_message: &str,
    sync: Fut,
) -> ReconcileOutcome<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    if !guard.fire(SyncEvent::Begin) {
        tracing::debug!(state = ?guard.state(), "Reconciliation already fired, skipping");
        return ReconcileOutcome::Skipped;
    }

    match sync.await {
        Ok(value) => {
            guard.fire(SyncEvent::Succeeded);
            tracing::info!(mode = ?mode, "Payment reconciliation succeeded");
            ReconcileOutcome::Synced(value)
        }
        Err(e) => {
            guard.fire(SyncEvent::Failed);
            match mode {
                SyncMode::Background => {
                    tracing::warn!(error = %e, "Automatic payment sync failed; waiting for webhook");
                    ReconcileOutcome::Failed { notice: None }
                }
                SyncMode::Foreground => {
                    tracing::error!(error = %e, "Payment sync failed");
                    ReconcileOutcome::Failed {
                        notice: Some(Notice::error(failure_message)),
                    }
                }
            }
        }
    }
}

/// Guards keyed by reconciliation target.
///
/// A finished guard keeps refusing for `ttl`, which absorbs reloads and
/// duplicate renders. After that it is re-armed so a later payment for the
/// same target reconciles again.
#[derive(Debug)]
pub struct GuardRegistry<K> {
    guards: Mutex<HashMap<K, Arc<SyncGuard>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K: Eq + Hash + Clone> GuardRegistry<K> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_GUARDS)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            guards: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<SyncGuard>>> {
        self.guards.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Guard for `key`, created or re-armed as needed
    pub fn guard(&self, key: K) -> Arc<SyncGuard> {
        let mut guards = self.lock();

        if let Some(existing) = guards.get(&key) {
            if existing.is_stale(self.ttl) {
                existing.fire(SyncEvent::Reset);
            }
            return Arc::clone(existing);
        }

        if guards.len() >= self.max_entries {
            let ttl = self.ttl;
            guards.retain(|_, g| !g.is_stale(ttl));
            if guards.len() >= self.max_entries {
                // Still full: drop finished guards early, never in-flight ones
                guards.retain(|_, g| g.state() == SyncState::Syncing);
                tracing::warn!(
                    remaining = guards.len(),
                    "Reconciliation guard registry full, evicted finished guards"
                );
            }
        }

        let guard = Arc::new(SyncGuard::new());
        guards.insert(key, Arc::clone(&guard));
        guard
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(SyncState::Idle.next(SyncEvent::Begin), Some(SyncState::Syncing));
        assert_eq!(SyncState::Syncing.next(SyncEvent::Begin), None);
        assert_eq!(SyncState::Synced.next(SyncEvent::Begin), None);
        assert_eq!(SyncState::Failed.next(SyncEvent::Begin), None);
        assert_eq!(SyncState::Idle.next(SyncEvent::Succeeded), None);
        assert_eq!(SyncState::Failed.next(SyncEvent::Reset), Some(SyncState::Idle));
        assert_eq!(SyncState::Syncing.next(SyncEvent::Reset), None);
    }

    #[test]
    fn test_marker_detection() {
        let m = ReturnMarker::PaymentSuccess;
        assert!(m.is_present(Some("payment=success")));
        assert!(m.is_present(Some("tab=2&payment=success")));
        assert!(!m.is_present(Some("payment=cancelled")));
        assert!(!m.is_present(None));
        assert!(!ReturnMarker::TopUpSuccess.is_present(Some("payment=success")));
    }

    #[test]
    fn test_strip_keeps_other_params() {
        let m = ReturnMarker::TopUpSuccess;
        assert_eq!(m.strip("/billing", Some("topUp=success")), "/billing");
        assert_eq!(m.strip("/billing", Some("page=2&topUp=success")), "/billing?page=2");
        assert_eq!(m.strip("/billing", None), "/billing");
    }

    #[tokio::test]
    async fn test_second_reconcile_is_skipped() {
        let guard = SyncGuard::new();
        let first = reconcile(&guard, SyncMode::Foreground, "failed", async {
            Ok::<_, String>(1)
        })
        .await;
        assert!(first.is_synced());

        let second = reconcile(&guard, SyncMode::Foreground, "failed", async {
            Ok::<_, String>(2)
        })
        .await;
        assert!(matches!(second, ReconcileOutcome::Skipped));
        assert_eq!(guard.state(), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_background_failure_is_silent() {
        let guard = SyncGuard::new();
        let outcome = reconcile::<(), _, _>(&guard, SyncMode::Background, "failed", async {
            Err("webhook pending")
        })
        .await;
        assert!(outcome.notice().is_none());
        // Not rolled back
        assert_eq!(guard.state(), SyncState::Failed);
    }

    #[tokio::test]
    async fn test_foreground_failure_notifies() {
        let guard = SyncGuard::new();
        let outcome = reconcile::<(), _, _>(&guard, SyncMode::Foreground, "Could not verify", async {
            Err("boom")
        })
        .await;
        assert_eq!(outcome.notice(), Some(&Notice::error("Could not verify")));
    }

    #[test]
    fn test_registry_rearms_after_ttl() {
        let registry = GuardRegistry::new(Duration::ZERO);
        let guard = registry.guard("billing");
        assert!(guard.fire(SyncEvent::Begin));
        assert!(guard.fire(SyncEvent::Succeeded));

        let again = registry.guard("billing");
        assert!(Arc::ptr_eq(&guard, &again));
        assert_eq!(again.state(), SyncState::Idle);
    }

    #[test]
    fn test_registry_holds_within_ttl() {
        let registry = GuardRegistry::new(Duration::from_secs(3600));
        let guard = registry.guard("r1");
        guard.fire(SyncEvent::Begin);
        guard.fire(SyncEvent::Failed);
        assert_eq!(registry.guard("r1").state(), SyncState::Failed);
    }

    #[test]
    fn test_registry_eviction_spares_in_flight() {
        let registry = GuardRegistry::with_capacity(Duration::from_secs(3600), 2);
        let busy = registry.guard(1);
        busy.fire(SyncEvent::Begin);
        let done = registry.guard(2);
        done.fire(SyncEvent::Begin);
        done.fire(SyncEvent::Succeeded);

        registry.guard(3);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.guard(1).state(), SyncState::Syncing);
    }
}
