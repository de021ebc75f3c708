use crate::buckets::{day_key, is_same_day, trailing_week, weekday_label};
use crate::leaderboard::rank_by_attribution;
use crate::types::{
    DonationRecord, FoodType, ImpactView, NamedValue, Packaging, RequestRecord, StatsView,
    Status, StatusCount, WeeklyPoint,
};
use crate::util::{donor_identity, organization_identity, QuantityPolicy};
use chrono::{DateTime, NaiveDate, TimeZone};
use std::collections::{HashMap, HashSet};

/// Default size of the all-time top donors series.
pub const TOP_DONORS: usize = 4;

pub fn compute_stats<Tz: TimeZone>(
    donations: &[DonationRecord],
    requests: &[RequestRecord],
    now: &DateTime<Tz>,
) -> StatsView {
    let meals_saved_today = donations
        .iter()
        .filter(|d| is_same_day(d.created_at, now))
        .map(|d| QuantityPolicy::AtLeastOne.weigh(d.details.quantity.as_deref()))
        .fold(0u64, u64::saturating_add);

    let donors: HashSet<&str> = donations.iter().filter_map(donor_identity).collect();
    let organizations: HashSet<&str> = requests.iter().filter_map(organization_identity).collect();

    StatsView {
        meals_saved_today,
        active_donors: donors.len(),
        organizations_helped: organizations.len(),
    }
}

/// Meals per day over the trailing week, oldest first. Always seven points.
pub fn weekly_trend<Tz: TimeZone>(
    donations: &[DonationRecord],
    now: &DateTime<Tz>,
) -> Vec<WeeklyPoint> {
    let tz = now.timezone();
    let week = trailing_week(now.date_naive());
    let slots: HashMap<NaiveDate, usize> = week.iter().enumerate().map(|(i, d)| (*d, i)).collect();

    let mut totals = [0u64; 7];
    for d in donations {
        let Some(day) = day_key(d.created_at, &tz) else {
            continue;
        };
        if let Some(&slot) = slots.get(&day) {
            let weight = QuantityPolicy::AtLeastOne.weigh(d.details.quantity.as_deref());
            totals[slot] = totals[slot].saturating_add(weight);
        }
    }

    week.iter()
        .zip(totals)
        .map(|(date, donations)| WeeklyPoint {
            day: weekday_label(*date),
            date: *date,
            donations,
        })
        .collect()
}

/// Record counts per food type and per packaging. A record may land in one
/// type bucket and one packaging bucket at the same time.
pub fn type_distribution(donations: &[DonationRecord]) -> Vec<NamedValue> {
    let count_type = |t: FoodType| {
        donations
            .iter()
            .filter(|d| d.details.food_type == Some(t))
            .count() as u64
    };
    let count_packaging = |p: Packaging| {
        donations
            .iter()
            .filter(|d| d.details.packaging == Some(p))
            .count() as u64
    };
    vec![
        NamedValue::new("Cooked", count_type(FoodType::Cooked)),
        NamedValue::new("Raw", count_type(FoodType::Raw)),
        NamedValue::new("Packed", count_packaging(Packaging::Packed)),
        NamedValue::new("Unpacked", count_packaging(Packaging::Unpacked)),
    ]
}

pub fn top_donors(donations: &[DonationRecord], limit: usize) -> Vec<NamedValue> {
    rank_by_attribution(donations, limit)
}

pub fn compute_impact<Tz: TimeZone>(
    donations: &[DonationRecord],
    now: &DateTime<Tz>,
    top_limit: usize,
) -> ImpactView {
    ImpactView {
        weekly: weekly_trend(donations, now),
        types: type_distribution(donations),
        top_donors: top_donors(donations, top_limit),
    }
}

/// Records per lifecycle stage, in lifecycle order. Unrecognized labels are
/// left out.
pub fn status_breakdown(donations: &[DonationRecord], requests: &[RequestRecord]) -> Vec<StatusCount> {
    Status::LIFECYCLE
        .iter()
        .map(|&status| StatusCount {
            status,
            donations: donations.iter().filter(|d| d.status == status).count(),
            requests: requests.iter().filter(|r| r.status == status).count(),
        })
        .collect()
}
