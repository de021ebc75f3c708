// Recompute controller: decides *when* the pure aggregators run.
//
// Every change signal bumps a version counter. Views are derived from a full
// store snapshot the first time they are observed at a given version (and
// local day); later observations at the same version reuse that snapshot.
use crate::leaderboard::{monthly_leaderboard, LEADERBOARD_SIZE};
use crate::notify::{ChangeNotifier, ChangeSignal, Subscription};
use crate::reports::{compute_impact, compute_stats, status_breakdown, TOP_DONORS};
use crate::store::RecordStore;
use crate::types::{DonationRecord, ImpactView, NamedValue, StatsView, StatusCount};
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Source of "now" in the observer's time zone.
pub trait Clock {
    type Tz: TimeZone;
    fn now(&self) -> DateTime<Self::Tz>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock<Tz: TimeZone> {
    now: Mutex<DateTime<Tz>>,
}

impl<Tz: TimeZone> FixedClock<Tz> {
    pub fn new(now: DateTime<Tz>) -> Self {
        FixedClock {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Tz>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }
}

impl<Tz: TimeZone> Clock for FixedClock<Tz> {
    type Tz = Tz;

    fn now(&self) -> DateTime<Tz> {
        self.now.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    type Tz = C::Tz;

    fn now(&self) -> DateTime<C::Tz> {
        (**self).now()
    }
}

/// Series sizes for ranked views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub top_donors: usize,
    pub leaderboard: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            top_donors: TOP_DONORS,
            leaderboard: LEADERBOARD_SIZE,
        }
    }
}

struct Snapshot {
    version: u64,
    day: NaiveDate,
    donations: Vec<DonationRecord>,
    stats: StatsView,
    impact: ImpactView,
    breakdown: Vec<StatusCount>,
    leaderboards: HashMap<(i32, u32), Vec<NamedValue>>,
}

pub struct RecomputeController<S, N, C>
where
    S: RecordStore,
    N: ChangeNotifier,
    C: Clock,
{
    store: S,
    notifier: N,
    clock: C,
    limits: Limits,
    version: Arc<AtomicU64>,
    cache: Mutex<Option<Snapshot>>,
    _subscription: Subscription,
}

impl<S, N, C> RecomputeController<S, N, C>
where
    S: RecordStore,
    N: ChangeNotifier,
    C: Clock,
{
    pub fn new(store: S, notifier: N, clock: C) -> Self {
        Self::with_limits(store, notifier, clock, Limits::default())
    }

    pub fn with_limits(store: S, notifier: N, clock: C, limits: Limits) -> Self {
        let version = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&version);
        let subscription = notifier.subscribe(Arc::new(move |signal: ChangeSignal| {
            let v = counter.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(?signal, version = v, "views invalidated");
        }));
        RecomputeController {
            store,
            notifier,
            clock,
            limits,
            version,
            cache: Mutex::new(None),
            _subscription: subscription,
        }
    }

    /// Number of change signals seen so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Current time from the controller's clock.
    pub fn now(&self) -> DateTime<C::Tz> {
        self.clock.now()
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Whether the next observation will re-read the store.
    pub fn is_stale(&self) -> bool {
        let today = self.clock.now().date_naive();
        let cache = self.lock_cache();
        match cache.as_ref() {
            Some(snap) => snap.version != self.version() || snap.day != today,
            None => true,
        }
    }

    /// Consumer trigger after producing a new record or status change.
    pub fn notify_data_changed(&self) {
        self.notifier.publish(ChangeSignal::DataChanged);
    }

    pub fn stats(&self) -> StatsView {
        self.with_snapshot(|snap, _| snap.stats)
    }

    pub fn impact(&self) -> ImpactView {
        self.with_snapshot(|snap, _| snap.impact.clone())
    }

    pub fn status_breakdown(&self) -> Vec<StatusCount> {
        self.with_snapshot(|snap, _| snap.breakdown.clone())
    }

    /// Top donors for `(year, month)`, month 1-based.
    pub fn monthly_leaderboard(&self, year: i32, month: u32) -> Vec<NamedValue> {
        let limit = self.limits.leaderboard;
        self.with_snapshot(|snap, now| {
            let tz = now.timezone();
            let Snapshot {
                donations,
                leaderboards,
                ..
            } = snap;
            leaderboards
                .entry((year, month))
                .or_insert_with(|| monthly_leaderboard(donations, year, month, &tz, limit))
                .clone()
        })
    }

    /// Leaderboard for the clock's current month.
    pub fn current_leaderboard(&self) -> Vec<NamedValue> {
        let now = self.clock.now();
        self.monthly_leaderboard(now.year(), now.month())
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<Snapshot>> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn with_snapshot<T>(&self, f: impl FnOnce(&mut Snapshot, &DateTime<C::Tz>) -> T) -> T {
        let now = self.clock.now();
        let today = now.date_naive();
        let version = self.version();
        let mut cache = self.lock_cache();
        let fresh = matches!(cache.as_ref(), Some(s) if s.version == version && s.day == today);
        if !fresh {
            *cache = None;
        }
        let snap = cache.get_or_insert_with(|| self.recompute(version, &now));
        f(snap, &now)
    }

    fn recompute(&self, version: u64, now: &DateTime<C::Tz>) -> Snapshot {
        let donations = self.store.list_donations();
        let requests = self.store.list_requests();
        tracing::debug!(
            version,
            donations = donations.len(),
            requests = requests.len(),
            "recomputing impact views"
        );
        let stats = compute_stats(&donations, &requests, now);
        let impact = compute_impact(&donations, now, self.limits.top_donors);
        let breakdown = status_breakdown(&donations, &requests);
        Snapshot {
            version,
            day: now.date_naive(),
            donations,
            stats,
            impact,
            breakdown,
            leaderboards: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LocalNotifier;
    use crate::store::InMemoryStore;
    use crate::test_support::{donation, utc_ms};
    use chrono::Utc;

    fn setup() -> (
        Arc<InMemoryStore>,
        LocalNotifier,
        RecomputeController<Arc<InMemoryStore>, LocalNotifier, FixedClock<Utc>>,
    ) {
        let store = Arc::new(InMemoryStore::new());
        let notifier = LocalNotifier::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).unwrap());
        let controller = RecomputeController::new(Arc::clone(&store), notifier.clone(), clock);
        (store, notifier, controller)
    }

    #[test]
    fn views_stay_cached_until_a_signal() {
        let (store, _notifier, controller) = setup();
        assert_eq!(controller.stats().meals_saved_today, 0);

        store.append_donation(donation("1", Some("A"), None, "7 plates", utc_ms(2025, 3, 5, 9, 0)));
        assert_eq!(controller.stats().meals_saved_today, 0);
        assert!(!controller.is_stale());

        controller.notify_data_changed();
        assert_eq!(controller.version(), 1);
        assert!(controller.is_stale());
        assert_eq!(controller.stats().meals_saved_today, 7);
    }

    #[test]
    fn storage_signal_also_invalidates() {
        let (store, notifier, controller) = setup();
        let _ = controller.impact();
        store.append_donation(donation("1", Some("A"), None, "2", utc_ms(2025, 3, 4, 9, 0)));
        notifier.publish(ChangeSignal::StorageChanged);
        assert_eq!(controller.impact().weekly_total(), 2);
    }

    #[test]
    fn dropping_controller_unsubscribes() {
        let (_store, notifier, controller) = setup();
        assert_eq!(notifier.listener_count(), 1);
        drop(controller);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn current_month_comes_from_the_clock() {
        let store = Arc::new(InMemoryStore::new());
        store.append_donation(donation("1", Some("A"), None, "4", utc_ms(2024, 12, 31, 9, 0)));
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 2, 8, 0, 0).unwrap()));
        let controller = RecomputeController::new(store, LocalNotifier::new(), Arc::clone(&clock));
        assert!(controller.current_leaderboard().is_empty());

        clock.set(Utc.with_ymd_and_hms(2024, 12, 31, 20, 0, 0).unwrap());
        assert_eq!(controller.now().month(), 12);
        assert_eq!(controller.current_leaderboard(), vec![NamedValue::new("A", 4)]);
    }

    #[test]
    fn leaderboard_follows_clock_month() {
        let (store, notifier, controller) = setup();
        store.append_donation(donation("1", Some("A"), None, "4", utc_ms(2025, 3, 1, 9, 0)));
        store.append_donation(donation("2", Some("B"), None, "9", utc_ms(2025, 2, 1, 9, 0)));
        notifier.publish(ChangeSignal::DataChanged);
        assert_eq!(controller.current_leaderboard(), vec![NamedValue::new("A", 4)]);
        assert_eq!(controller.monthly_leaderboard(2025, 2), vec![NamedValue::new("B", 9)]);
        assert!(controller.monthly_leaderboard(2025, 1).is_empty());
    }
}
