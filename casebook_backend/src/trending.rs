//! Time-bounded cache in front of the "trending cases" query.
//!
//! The cache holds a single snapshot of the top `capacity` cases. Every call
//! inside the TTL is answered by slicing that snapshot, so results for
//! different limits are prefixes of one ranked sequence.

use crate::config::TrendingConfig;
use crate::database::models::TrendingCaseRecord;
use crate::database::repositories::ActivityRepository;
use crate::database::Database;
use crate::error::ServiceResult;
use crate::utils::format_timestamp;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock};

/// Score added to a case when a comment is posted on it.
pub const COMMENT_WEIGHT: f64 = 2.0;
/// Score added when a vote on one of the case's comments changes.
pub const VOTE_WEIGHT: f64 = 1.0;
/// Score added when the case receives an award.
pub const AWARD_WEIGHT: f64 = 3.0;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Produces ranked cases with activity at or after `since`, best first.
pub trait TrendingSource: Send + Sync {
    fn fetch_trending(&self, since: DateTime<Utc>, limit: usize) -> anyhow::Result<Vec<TrendingItem>>;
}

#[derive(Clone)]
pub struct DatabaseTrendingSource {
    database: Database,
}

impl DatabaseTrendingSource {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl TrendingSource for DatabaseTrendingSource {
    fn fetch_trending(&self, since: DateTime<Utc>, limit: usize) -> anyhow::Result<Vec<TrendingItem>> {
        let since = format_timestamp(since);
        let records = self
            .database
            .with_repositories(|repos| repos.activity().list_trending(&since, limit))?;
        Ok(records.into_iter().map(TrendingItem::from).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingItem {
    pub case_id: String,
    pub title: String,
    pub owner_user_id: String,
    pub award_count: i64,
    pub trending_score: f64,
    pub last_interaction_at: String,
}

impl From<TrendingCaseRecord> for TrendingItem {
    fn from(record: TrendingCaseRecord) -> Self {
        Self {
            case_id: record.case_id,
            title: record.title,
            owner_user_id: record.owner_user_id,
            award_count: record.award_count,
            trending_score: record.trending_score,
            last_interaction_at: record.last_interaction_at,
        }
    }
}

struct Snapshot {
    fetched_at: DateTime<Utc>,
    items: Arc<[TrendingItem]>,
}

impl Snapshot {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        // A clock that moved backwards counts as stale.
        now.signed_duration_since(self.fetched_at)
            .to_std()
            .map(|age| age < ttl)
            .unwrap_or(false)
    }
}

pub struct TrendingCache {
    clock: Arc<dyn Clock>,
    source: Arc<dyn TrendingSource>,
    config: TrendingConfig,
    slot: RwLock<Option<Snapshot>>,
    /// Held while querying the source so concurrent misses share one query.
    refresh: Mutex<()>,
}

impl TrendingCache {
    pub fn new(clock: Arc<dyn Clock>, source: Arc<dyn TrendingSource>, config: TrendingConfig) -> Self {
        Self {
            clock,
            source,
            config,
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Cache backed by the database and the wall clock.
    pub fn for_database(database: Database, config: TrendingConfig) -> Self {
        Self::new(
            Arc::new(SystemClock),
            Arc::new(DatabaseTrendingSource::new(database)),
            config,
        )
    }

    /// Top `limit` trending cases. `limit` is clamped to the configured
    /// capacity. A failed query leaves any previous snapshot in place.
    pub fn get_trending(&self, limit: usize) -> ServiceResult<Vec<TrendingItem>> {
        let limit = limit.min(self.config.capacity);
        if let Some(items) = self.fresh_prefix(self.clock.now(), limit)? {
            return Ok(items);
        }

        let _refresh = self
            .refresh
            .lock()
            .map_err(|_| anyhow!("trending refresh lock poisoned"))?;
        // Another caller may have refreshed while this one waited.
        let now = self.clock.now();
        if let Some(items) = self.fresh_prefix(now, limit)? {
            return Ok(items);
        }

        let since = now - self.config.window;
        let items: Arc<[TrendingItem]> = self
            .source
            .fetch_trending(since, self.config.capacity)?
            .into();
        tracing::debug!(count = items.len(), since = %format_timestamp(since), "trending recomputed");

        let current = self.install(now, items)?;
        Ok(prefix(&current, limit))
    }

    fn fresh_prefix(&self, now: DateTime<Utc>, limit: usize) -> ServiceResult<Option<Vec<TrendingItem>>> {
        let slot = self
            .slot
            .read()
            .map_err(|_| anyhow!("trending cache lock poisoned"))?;
        Ok(slot
            .as_ref()
            .filter(|snapshot| snapshot.is_fresh(now, self.config.ttl))
            .map(|snapshot| prefix(&snapshot.items, limit)))
    }

    /// Swaps in a snapshot computed at `fetched_at` unless the slot already
    /// holds a later one, and returns the items left in the slot.
    fn install(
        &self,
        fetched_at: DateTime<Utc>,
        items: Arc<[TrendingItem]>,
    ) -> ServiceResult<Arc<[TrendingItem]>> {
        let mut slot = self
            .slot
            .write()
            .map_err(|_| anyhow!("trending cache lock poisoned"))?;
        match slot.as_ref() {
            Some(current) if current.fetched_at > fetched_at => Ok(current.items.clone()),
            _ => {
                *slot = Some(Snapshot {
                    fetched_at,
                    items: items.clone(),
                });
                Ok(items)
            }
        }
    }
}

fn prefix(items: &[TrendingItem], limit: usize) -> Vec<TrendingItem> {
    items.iter().take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(now),
            })
        }

        fn advance(&self, by: chrono::Duration) {
            let mut now = self.now.lock().unwrap();
            *now = *now + by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct ScriptedSource {
        items: Mutex<Vec<TrendingItem>>,
        calls: AtomicUsize,
        fail: AtomicBool,
        delay_ms: AtomicU64,
        last_since: Mutex<Option<DateTime<Utc>>>,
    }

    impl ScriptedSource {
        fn with_cases(count: usize) -> Arc<Self> {
            let source = Arc::new(Self::default());
            source.set_items((0..count).map(|i| item(&format!("case-{i}"), (count - i) as f64)).collect());
            source
        }

        fn set_items(&self, items: Vec<TrendingItem>) {
            *self.items.lock().unwrap() = items;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TrendingSource for ScriptedSource {
        fn fetch_trending(&self, since: DateTime<Utc>, limit: usize) -> anyhow::Result<Vec<TrendingItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                std::thread::sleep(Duration::from_millis(delay));
            }
            *self.last_since.lock().unwrap() = Some(since);
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("query timed out"));
            }
            Ok(self.items.lock().unwrap().iter().take(limit).cloned().collect())
        }
    }

    fn item(case_id: &str, score: f64) -> TrendingItem {
        TrendingItem {
            case_id: case_id.into(),
            title: format!("Title {case_id}"),
            owner_user_id: "dr-owner".into(),
            award_count: 0,
            trending_score: score,
            last_interaction_at: "2026-03-01T00:00:00.000Z".into(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn cache(clock: Arc<ManualClock>, source: Arc<ScriptedSource>) -> TrendingCache {
        TrendingCache::new(clock, source, TrendingConfig::default())
    }

    fn case_ids(items: &[TrendingItem]) -> Vec<&str> {
        items.iter().map(|item| item.case_id.as_str()).collect()
    }

    #[test]
    fn calls_within_ttl_return_prefixes_of_one_snapshot() {
        let clock = ManualClock::starting_at(t0());
        let source = ScriptedSource::with_cases(30);
        let cache = cache(clock.clone(), source.clone());

        let twenty = cache.get_trending(20).unwrap();
        clock.advance(chrono::Duration::minutes(2));
        let ten = cache.get_trending(10).unwrap();

        assert_eq!(twenty.len(), 20);
        assert_eq!(ten.as_slice(), &twenty[..10]);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn limit_is_clamped_to_capacity() {
        let clock = ManualClock::starting_at(t0());
        let source = ScriptedSource::with_cases(80);
        let cache = cache(clock, source);
        assert_eq!(cache.get_trending(1_000).unwrap().len(), 50);
        assert!(cache.get_trending(0).unwrap().is_empty());
    }

    #[test]
    fn requeries_once_ttl_has_elapsed() {
        let clock = ManualClock::starting_at(t0());
        let source = ScriptedSource::with_cases(3);
        let cache = cache(clock.clone(), source.clone());
        cache.get_trending(3).unwrap();

        source.set_items(vec![item("fresh", 9.0)]);
        clock.advance(chrono::Duration::seconds(299));
        assert_eq!(case_ids(&cache.get_trending(3).unwrap()), vec!["case-0", "case-1", "case-2"]);

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(case_ids(&cache.get_trending(3).unwrap()), vec!["fresh"]);
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn window_is_measured_from_the_clock() {
        let clock = ManualClock::starting_at(t0());
        let source = ScriptedSource::with_cases(1);
        let cache = cache(clock, source.clone());
        cache.get_trending(1).unwrap();
        let since = source.last_since.lock().unwrap().expect("since recorded");
        assert_eq!(since, t0() - chrono::Duration::days(7));
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let clock = ManualClock::starting_at(t0());
        let source = ScriptedSource::with_cases(2);
        let cache = cache(clock.clone(), source.clone());
        let first = cache.get_trending(2).unwrap();

        clock.advance(chrono::Duration::minutes(6));
        source.fail.store(true, Ordering::SeqCst);
        let failed = cache.get_trending(2);
        assert!(matches!(failed, Err(ServiceError::Store(_))));

        source.fail.store(false, Ordering::SeqCst);
        source.set_items(vec![item("after-recovery", 1.0)]);
        let recovered = cache.get_trending(2).unwrap();
        assert_eq!(case_ids(&recovered), vec!["after-recovery"]);
        assert_ne!(recovered, first);
    }

    #[test]
    fn failed_first_query_leaves_slot_empty() {
        let clock = ManualClock::starting_at(t0());
        let source = ScriptedSource::with_cases(2);
        source.fail.store(true, Ordering::SeqCst);
        let cache = cache(clock, source.clone());
        assert!(cache.get_trending(2).is_err());

        source.fail.store(false, Ordering::SeqCst);
        assert_eq!(cache.get_trending(2).unwrap().len(), 2);
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn short_ttl_config_is_honoured() {
        let clock = ManualClock::starting_at(t0());
        let source = ScriptedSource::with_cases(1);
        let config = TrendingConfig {
            ttl: Duration::from_secs(1),
            ..TrendingConfig::default()
        };
        let cache = TrendingCache::new(clock.clone(), source.clone(), config);
        cache.get_trending(1).unwrap();
        clock.advance(chrono::Duration::seconds(1));
        cache.get_trending(1).unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn concurrent_readers_share_one_query() {
        const READERS: usize = 8;
        let clock = ManualClock::starting_at(t0());
        let source = ScriptedSource::with_cases(20);
        source.delay_ms.store(50, Ordering::SeqCst);
        let cache = cache(clock, source.clone());
        let expected: Vec<TrendingItem> = source.items.lock().unwrap().clone();
        let barrier = Barrier::new(READERS);

        let results: Vec<(usize, Vec<TrendingItem>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (1..=READERS)
                .map(|limit| {
                    let cache = &cache;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        (limit, cache.get_trending(limit).expect("trending"))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("reader thread"))
                .collect()
        });

        for (limit, items) in results {
            assert_eq!(items.as_slice(), &expected[..limit]);
        }
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn older_snapshot_never_replaces_a_newer_one() {
        let clock = ManualClock::starting_at(t0());
        let source = ScriptedSource::with_cases(1);
        let cache = cache(clock, source);

        let newer: Arc<[TrendingItem]> = vec![item("newer", 2.0)].into();
        let older: Arc<[TrendingItem]> = vec![item("older", 1.0)].into();
        cache
            .install(t0() + chrono::Duration::seconds(10), newer)
            .unwrap();
        let kept = cache.install(t0(), older).unwrap();
        assert_eq!(case_ids(&kept), vec!["newer"]);

        let slot = cache.slot.read().unwrap();
        let snapshot = slot.as_ref().expect("snapshot");
        assert_eq!(snapshot.fetched_at, t0() + chrono::Duration::seconds(10));
        assert_eq!(case_ids(&snapshot.items), vec!["newer"]);
    }

    #[test]
    fn database_source_ranks_recent_activity() {
        use crate::cases::{CaseService, ClinicalFields, CreateCaseInput};
        use crate::database::test_database;

        let database = test_database();
        let cases = CaseService::new(database.clone());
        let mut ids = Vec::new();
        for title in ["quiet", "busy", "stale"] {
            let case = cases
                .create_case(
                    "dr-owner",
                    CreateCaseInput {
                        title: title.into(),
                        fields: ClinicalFields::default(),
                        specialties: vec![],
                        media_urls: vec![],
                    },
                )
                .unwrap();
            ids.push(case.id);
        }
        database
            .with_repositories(|repos| {
                let activity = repos.activity();
                activity.record_interaction(&ids[0], 1.0, "2026-03-01T10:00:00.000Z")?;
                activity.record_interaction(&ids[1], 4.0, "2026-03-01T09:00:00.000Z")?;
                activity.record_interaction(&ids[2], 10.0, "2026-02-01T09:00:00.000Z")?;
                Ok(())
            })
            .unwrap();

        let cache = TrendingCache::new(
            ManualClock::starting_at(t0()),
            Arc::new(DatabaseTrendingSource::new(database)),
            TrendingConfig::default(),
        );
        let trending = cache.get_trending(10).unwrap();
        let titles: Vec<&str> = trending.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(titles, vec!["busy", "quiet"]);
    }
}
