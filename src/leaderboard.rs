use crate::buckets::month_key;
use crate::types::{DonationRecord, NamedValue};
use crate::util::{attribution_key, QuantityPolicy};
use chrono::TimeZone;
use std::collections::HashMap;

/// Default size of the monthly leaderboard.
pub const LEADERBOARD_SIZE: usize = 10;

/// Group donations by attribution key, sum their weights, and keep the
/// `limit` largest groups.
///
/// Groups keep the order in which their key was first seen, and the sort is
/// stable, so equal totals stay in input order.
pub fn rank_by_attribution<'a, I>(donations: I, limit: usize) -> Vec<NamedValue>
where
    I: IntoIterator<Item = &'a DonationRecord>,
{
    let mut slots: HashMap<&'a str, usize> = HashMap::new();
    let mut totals: Vec<NamedValue> = Vec::new();
    for d in donations {
        let key = attribution_key(d);
        let weight = QuantityPolicy::AtLeastOne.weigh(d.details.quantity.as_deref());
        match slots.get(key) {
            Some(&slot) => {
                totals[slot].value = totals[slot].value.saturating_add(weight);
            }
            None => {
                slots.insert(key, totals.len());
                totals.push(NamedValue::new(key, weight));
            }
        }
    }
    totals.sort_by(|a, b| b.value.cmp(&a.value));
    totals.truncate(limit);
    totals
}

/// Top donors for one calendar month in the observer's zone.
///
/// `month` is 1-based. A month without donations (or an invalid month) gives
/// an empty list.
pub fn monthly_leaderboard<Tz: TimeZone>(
    donations: &[DonationRecord],
    year: i32,
    month: u32,
    tz: &Tz,
    limit: usize,
) -> Vec<NamedValue> {
    if !(1..=12).contains(&month) {
        return Vec::new();
    }
    let in_month = donations
        .iter()
        .filter(|d| month_key(d.created_at, tz) == Some((year, month)));
    rank_by_attribution(in_month, limit)
}
