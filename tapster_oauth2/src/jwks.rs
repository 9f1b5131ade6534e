//! The cached key set of the identity provider

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use tapster::{jwk::KeyIdRef, Jwk, Jwks};
use tokio::{task::JoinHandle, time::Instant};

use crate::KeySetError;

mod local;
mod remote;

pub use local::StaticKeySource;
pub use remote::RemoteKeySource;

/// A source of key sets
#[async_trait]
pub trait KeySource: fmt::Debug + Send + Sync + 'static {
    /// Fetches the current key set
    async fn fetch(&self) -> Result<Jwks, KeySetError>;

    /// A short description of where keys come from, for logs
    fn describe(&self) -> &str;
}

/// An immutable snapshot of the identity provider's keys
#[derive(Debug)]
pub struct KeySet {
    jwks: Jwks,
    fetched_at: Instant,
    generation: u64,
}

impl KeySet {
    /// The keys in this snapshot
    #[must_use]
    pub fn jwks(&self) -> &Jwks {
        &self.jwks
    }

    /// Gets the key with the given id
    #[must_use]
    pub fn get(&self, kid: &KeyIdRef) -> Option<&Jwk> {
        self.jwks.get_key_by_id(kid)
    }

    /// When this snapshot was obtained
    #[must_use]
    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// A counter that increases each time a new snapshot is published
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

type InFlight = Shared<BoxFuture<'static, Result<Arc<KeySet>, KeySetError>>>;

struct State {
    source: Arc<dyn KeySource>,
    current: ArcSwapOption<KeySet>,
    in_flight: Mutex<Option<InFlight>>,
    last_attempt: Mutex<Option<Instant>>,
    generation: AtomicU64,
}

impl State {
    fn publish(&self, jwks: Jwks) -> Arc<KeySet> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let set = Arc::new(KeySet {
            jwks,
            fetched_at: Instant::now(),
            generation,
        });

        self.current.store(Some(Arc::clone(&set)));
        set
    }
}

/// Clears the in-flight slot when the fetch task ends, even by panic
struct InFlightGuard<'a>(&'a State);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self
            .0
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// A lazily populated, single-flight cache of the identity provider's keys
///
/// The first call to [`get_keys()`][Self::get_keys] fetches the key set;
/// later calls return the cached snapshot. Concurrent fetches coalesce into
/// one request, and every caller joined to it sees the same outcome. A new
/// snapshot replaces the old one atomically, and a failed fetch leaves the
/// old snapshot in place.
///
/// Clones share the same cache.
#[derive(Clone)]
#[must_use]
pub struct KeySetCache {
    state: Arc<State>,
    fetch_timeout: Duration,
    min_refresh_interval: Duration,
}

impl fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySetCache")
            .field("source", &self.state.source)
            .field("current", &self.state.current.load().as_deref().map(KeySet::generation))
            .field("fetch_timeout", &self.fetch_timeout)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish()
    }
}

impl KeySetCache {
    /// The default upper bound on a single fetch
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

    /// The default minimum spacing between refreshes triggered by unknown key ids
    pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

    /// Constructs an empty cache that fetches from `source` on first use
    pub fn new(source: impl KeySource) -> Self {
        Self {
            state: Arc::new(State {
                source: Arc::new(source),
                current: ArcSwapOption::empty(),
                in_flight: Mutex::new(None),
                last_attempt: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
            fetch_timeout: Self::DEFAULT_FETCH_TIMEOUT,
            min_refresh_interval: Self::DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Constructs a cache already holding `jwks`
    ///
    /// Refreshes return the same keys.
    pub fn from_jwks(jwks: Jwks) -> Self {
        let cache = Self::new(StaticKeySource::new(jwks.clone()));
        cache.state.publish(jwks);
        cache
    }

    /// Sets the upper bound on a single fetch
    pub fn with_fetch_timeout(self, fetch_timeout: Duration) -> Self {
        Self {
            fetch_timeout,
            ..self
        }
    }

    /// Sets the minimum spacing between refreshes triggered by unknown key ids
    pub fn with_min_refresh_interval(self, min_refresh_interval: Duration) -> Self {
        Self {
            min_refresh_interval,
            ..self
        }
    }

    /// The current snapshot, if one has been obtained
    #[must_use]
    pub fn current(&self) -> Option<Arc<KeySet>> {
        self.state.current.load_full()
    }

    /// Replaces the current snapshot with `jwks`
    pub fn set_jwks(&self, jwks: Jwks) -> Arc<KeySet> {
        self.state.publish(jwks)
    }

    /// Gets the key set, fetching it if none has been obtained yet
    ///
    /// # Errors
    ///
    /// Returns an error if no snapshot is cached and the fetch fails.
    pub async fn get_keys(&self) -> Result<Arc<KeySet>, KeySetError> {
        if let Some(keys) = self.current() {
            return Ok(keys);
        }

        self.join_fetch(true).await
    }

    /// Fetches a fresh key set, replacing the cached snapshot on success
    ///
    /// If a fetch is already in flight, this joins it instead of starting
    /// another.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; the cached snapshot is kept.
    pub async fn force_refresh(&self) -> Result<Arc<KeySet>, KeySetError> {
        self.join_fetch(false).await
    }

    /// Gets a key set containing `kid`
    ///
    /// When the cached snapshot lacks `kid`, the key set is refreshed once,
    /// unless the last fetch attempt was more recent than the minimum
    /// refresh interval. A failed refresh is reported as the key being
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns an error only if no snapshot is cached and the initial fetch
    /// fails.
    pub async fn find_key_set(&self, kid: &KeyIdRef) -> Result<Option<Arc<KeySet>>, KeySetError> {
        let keys = self.get_keys().await?;
        if keys.get(kid).is_some() {
            return Ok(Some(keys));
        }

        if !self.may_refresh_on_miss() {
            tracing::debug!(jwk.kid = %kid, "unknown key id; refreshed too recently to retry");
            return Ok(None);
        }

        tracing::debug!(jwk.kid = %kid, "unknown key id; refreshing key set");
        match self.force_refresh().await {
            Ok(keys) if keys.get(kid).is_some() => Ok(Some(keys)),
            Ok(_) | Err(_) => Ok(None),
        }
    }

    /// Spawns a task that refreshes the key set every `interval`
    ///
    /// The first refresh happens one interval from now. Failures are logged
    /// and retried on the next tick. The task runs until aborted.
    pub fn spawn_refresh(&self, interval: Duration) -> JoinHandle<()> {
        let this = self.clone();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await;

            loop {
                timer.tick().await;
                // Failures were already logged; try again next time
                let _ = this.force_refresh().await;
            }
        })
    }

    fn may_refresh_on_miss(&self) -> bool {
        let last_attempt = *self
            .state
            .last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        last_attempt.map_or(true, |at| at.elapsed() >= self.min_refresh_interval)
    }

    fn join_fetch(&self, reuse_current: bool) -> InFlight {
        let mut slot = self
            .state
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(in_flight) = &*slot {
            return in_flight.clone();
        }

        // A fetch may have published and cleared the slot since the caller
        // last looked.
        if reuse_current {
            if let Some(keys) = self.current() {
                return future::ready(Ok(keys)).boxed().shared();
            }
        }

        let this = self.clone();
        let task = tokio::spawn(async move { this.fetch().await });

        let in_flight = async move {
            task.await.unwrap_or_else(|err| {
                let error: &dyn std::error::Error = &err;
                tracing::error!(error, "key set fetch task failed");
                Err(KeySetError::Unexpected)
            })
        }
        .boxed()
        .shared();

        *slot = Some(in_flight.clone());
        in_flight
    }

    #[tracing::instrument(skip(self), fields(jwks.source = %self.state.source.describe()))]
    async fn fetch(&self) -> Result<Arc<KeySet>, KeySetError> {
        let _guard = InFlightGuard(&self.state);

        *self
            .state
            .last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());

        tracing::debug!("fetching key set");
        let result = tokio::time::timeout(self.fetch_timeout, self.state.source.fetch())
            .await
            .unwrap_or(Err(KeySetError::Timeout(self.fetch_timeout)));

        match result {
            Ok(jwks) => {
                let keys = self.state.publish(jwks);
                tracing::info!(
                    jwks.keys = keys.jwks().len(),
                    jwks.generation = keys.generation(),
                    "key set refreshed"
                );
                Ok(keys)
            }
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "key set fetch failed");
                Err(err)
            }
        }
    }
}
