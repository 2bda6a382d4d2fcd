use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::warn;

use super::geometry::GeometryStore;
use super::model::{District, DistrictLevel, UserDistrictInfo};
use crate::db::DbError;

/// How long a resolved coordinate stays fresh.
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Time source for cache expiry, injectable so tests can advance it
/// without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry {
    info: UserDistrictInfo,
    expires_at: Instant,
}

type SharedLookup = Shared<BoxFuture<'static, UserDistrictInfo>>;

/// Resolves which districts contain a coordinate, one per government
/// level. Results are cached for five minutes keyed by the exact
/// coordinate pair, and concurrent lookups for the same key are coalesced
/// into a single set of store queries.
pub struct DistrictResolver {
    store: Arc<dyn GeometryStore>,
    clock: Arc<dyn Clock>,
    cache: Arc<Mutex<HashMap<String, CacheEntry>>>,
    in_flight: Arc<Mutex<HashMap<String, SharedLookup>>>,
}

impl DistrictResolver {
    pub fn new(store: Arc<dyn GeometryStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn GeometryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            cache: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve the districts containing (lat, lng).
    ///
    /// A level whose containment query fails resolves to null fields for
    /// that level; the other levels are unaffected. The call itself never
    /// fails. Dropping one waiter of a coalesced lookup leaves the shared
    /// query running for the others.
    pub async fn resolve_user_districts(&self, lat: f64, lng: f64) -> UserDistrictInfo {
        let key = format!("{},{}", lat, lng);

        if let Some(hit) = self.cache_get(&key) {
            return hit;
        }

        let lookup = {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(pending) = in_flight.get(&key) {
                pending.clone()
            } else {
                let store = Arc::clone(&self.store);
                let clock = Arc::clone(&self.clock);
                let cache = Arc::clone(&self.cache);
                let in_flight_map = Arc::clone(&self.in_flight);
                let fut_key = key.clone();
                // The completion bookkeeping lives inside the shared
                // future so it runs exactly once no matter how many
                // callers awaited it.
                let fut = async move {
                    let info = query_all_levels(store.as_ref(), lat, lng).await;
                    cache.lock().unwrap().insert(
                        fut_key.clone(),
                        CacheEntry {
                            info: info.clone(),
                            expires_at: clock.now() + CACHE_TTL,
                        },
                    );
                    in_flight_map.lock().unwrap().remove(&fut_key);
                    info
                }
                .boxed()
                .shared();
                in_flight.insert(key.clone(), fut.clone());
                fut
            }
        };

        lookup.await
    }

    fn cache_get(&self, key: &str) -> Option<UserDistrictInfo> {
        let cache = self.cache.lock().unwrap();
        cache
            .get(key)
            .filter(|entry| entry.expires_at > self.clock.now())
            .map(|entry| entry.info.clone())
    }
}

async fn query_all_levels(store: &dyn GeometryStore, lat: f64, lng: f64) -> UserDistrictInfo {
    let (federal, provincial, municipal) = futures::join!(
        store.containing_district(DistrictLevel::Federal, lat, lng),
        store.containing_district(DistrictLevel::Provincial, lat, lng),
        store.containing_district(DistrictLevel::Municipal, lat, lng),
    );

    UserDistrictInfo::from_levels(
        level_or_null(federal, DistrictLevel::Federal),
        level_or_null(provincial, DistrictLevel::Provincial),
        level_or_null(municipal, DistrictLevel::Municipal),
    )
}

fn level_or_null(
    result: Result<Option<District>, DbError>,
    level: DistrictLevel,
) -> Option<District> {
    match result {
        Ok(district) => district,
        Err(e) => {
            warn!("{} containment lookup failed: {}", level, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::district::geometry::MockGeometryStore;
    use axum::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_district(level: DistrictLevel) -> District {
        match level {
            DistrictLevel::Federal => District {
                id: 1,
                name: "Laurier—Sainte-Marie".to_string(),
                level,
                province: None,
                city: None,
                borough: None,
            },
            DistrictLevel::Provincial => District {
                id: 2,
                name: "Sainte-Marie—Saint-Jacques".to_string(),
                level,
                province: Some("QC".to_string()),
                city: None,
                borough: None,
            },
            DistrictLevel::Municipal => District {
                id: 3,
                name: "Ville-Marie".to_string(),
                level,
                province: None,
                city: Some("Montréal".to_string()),
                borough: Some("Ville-Marie".to_string()),
            },
        }
    }

    /// Store that counts containment calls and suspends on each one, so
    /// coalescing is observable while a lookup is genuinely in flight.
    struct CountingStore {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingStore {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GeometryStore for CountingStore {
        async fn containing_district(
            &self,
            level: DistrictLevel,
            _lat: f64,
            _lng: f64,
        ) -> Result<Option<District>, DbError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Some(sample_district(level)))
        }

        async fn districts_near(
            &self,
            _lat: f64,
            _lng: f64,
            _radius_km: f64,
        ) -> Result<Vec<crate::district::model::NearbyDistrict>, DbError> {
            Ok(Vec::new())
        }

        async fn district_names(&self, _level: DistrictLevel) -> Result<Vec<String>, DbError> {
            Ok(Vec::new())
        }
    }

    struct FakeClock {
        now: Mutex<Instant>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
            }
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_same_key_lookups_share_one_query_per_level() {
        let store = Arc::new(CountingStore::new(Duration::from_millis(50)));
        let resolver = DistrictResolver::new(store.clone());

        let (a, b) = futures::join!(
            resolver.resolve_user_districts(45.5017, -73.5673),
            resolver.resolve_user_districts(45.5017, -73.5673),
        );

        assert_eq!(store.calls(), 3);
        assert_eq!(a, b);
        assert_eq!(a.federal.as_deref(), Some("Laurier—Sainte-Marie"));
        assert_eq!(a.municipal.as_deref(), Some("Ville-Marie"));
        assert_eq!(a.municipal_borough.as_deref(), Some("Ville-Marie"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_waiter_does_not_cancel_shared_lookup() {
        let store = Arc::new(CountingStore::new(Duration::from_millis(50)));
        let resolver = DistrictResolver::new(store.clone());

        {
            let mut first = Box::pin(resolver.resolve_user_districts(45.5017, -73.5673));
            // Poll once so the shared lookup is installed, then abandon
            // this waiter.
            let _ = futures::poll!(first.as_mut());
        }

        let info = resolver.resolve_user_districts(45.5017, -73.5673).await;
        assert_eq!(store.calls(), 3);
        assert_eq!(info.provincial.as_deref(), Some("Sainte-Marie—Saint-Jacques"));
    }

    #[tokio::test]
    async fn distinct_coordinates_resolve_independently() {
        let mut store = MockGeometryStore::new();
        store
            .expect_containing_district()
            .times(6)
            .returning(|level, _, _| Ok(Some(sample_district(level))));
        let resolver = DistrictResolver::new(Arc::new(store));

        let first = resolver.resolve_user_districts(45.5017, -73.5673).await;
        let second = resolver.resolve_user_districts(43.6532, -79.3832).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cache_expires_after_ttl() {
        let mut store = MockGeometryStore::new();
        store
            .expect_containing_district()
            .times(6)
            .returning(|level, _, _| Ok(Some(sample_district(level))));
        let clock = Arc::new(FakeClock::new());
        let resolver = DistrictResolver::with_clock(Arc::new(store), clock.clone());

        resolver.resolve_user_districts(45.5017, -73.5673).await;
        // Within the TTL: served from cache, no further store calls.
        resolver.resolve_user_districts(45.5017, -73.5673).await;

        clock.advance(CACHE_TTL + Duration::from_secs(1));
        resolver.resolve_user_districts(45.5017, -73.5673).await;
    }

    #[tokio::test]
    async fn failed_level_resolves_null_without_blocking_others() {
        let mut store = MockGeometryStore::new();
        store
            .expect_containing_district()
            .times(3)
            .returning(|level, _, _| match level {
                DistrictLevel::Federal => Err(DbError::Timeout("federal containment query")),
                other => Ok(Some(sample_district(other))),
            });
        let resolver = DistrictResolver::new(Arc::new(store));

        let info = resolver.resolve_user_districts(45.5017, -73.5673).await;
        assert!(info.federal.is_none());
        assert_eq!(info.provincial.as_deref(), Some("Sainte-Marie—Saint-Jacques"));
        assert_eq!(info.municipal.as_deref(), Some("Ville-Marie"));
        assert_eq!(info.city.as_deref(), Some("Montréal"));
    }

    #[tokio::test]
    async fn level_yielding_no_district_stays_null() {
        let mut store = MockGeometryStore::new();
        store
            .expect_containing_district()
            .times(3)
            .returning(|level, _, _| match level {
                DistrictLevel::Municipal => Ok(None),
                other => Ok(Some(sample_district(other))),
            });
        let resolver = DistrictResolver::new(Arc::new(store));

        let info = resolver.resolve_user_districts(46.8139, -71.2080).await;
        assert!(info.municipal.is_none());
        assert!(info.city.is_none());
        assert!(info.municipal_borough.is_none());
        assert_eq!(info.federal.as_deref(), Some("Laurier—Sainte-Marie"));
    }
}
