//! Impact analytics for the FoodBridge donation log.
//!
//! Raw donation and request records go in; summary stats, a weekly trend, a
//! food type distribution, and donor rankings come out. The `controller`
//! module keeps those views fresh as the record store changes.
pub mod buckets;
pub mod config;
pub mod controller;
pub mod leaderboard;
pub mod notify;
pub mod output;
pub mod reports;
pub mod store;
pub mod types;
pub mod util;

#[cfg(test)]
mod test_support;

pub use controller::{Clock, FixedClock, Limits, RecomputeController, SystemClock};
pub use notify::{ChangeNotifier, ChangeSignal, LocalNotifier, StorageWatcher, Subscription};
pub use store::{InMemoryStore, JsonFileStore, RecordStore, StoreError};
pub use types::{
    DonationDetails, DonationRecord, FoodType, ImpactView, NamedValue, Packaging, RequestDetails,
    RequestRecord, StatsView, Status, StatusCount, Urgency, WeeklyPoint,
};
