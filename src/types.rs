use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// Epoch timestamp as found in the store: numeric millis from the web
/// client, or an RFC 3339 string from the API layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl RawTimestamp {
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            RawTimestamp::Millis(ms) => Some(*ms),
            RawTimestamp::Fractional(ms) if ms.is_finite() => Some(ms.trunc() as i64),
            RawTimestamp::Fractional(_) => None,
            RawTimestamp::Text(s) => {
                let s = s.trim();
                if let Ok(ms) = s.parse::<i64>() {
                    return Some(ms);
                }
                DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.timestamp_millis())
            }
        }
    }
}

/// Donation row exactly as stored. Both the client's camelCase keys and the
/// API layer's snake_case duplicates may be present on the same object.
#[derive(Debug, Deserialize)]
pub struct RawDonation {
    pub id: Option<String>,
    #[serde(rename = "donorName")]
    pub donor_name: Option<String>,
    #[serde(rename = "donor_name")]
    pub donor_name_alt: Option<String>,
    #[serde(rename = "donorEmail")]
    pub donor_email: Option<String>,
    #[serde(rename = "donor_email")]
    pub donor_email_alt: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<RawTimestamp>,
    #[serde(rename = "created_at")]
    pub created_at_alt: Option<RawTimestamp>,
    pub details: Option<RawDonationDetails>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawDonationDetails {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub food_type: Option<String>,
    pub packed: Option<String>,
    pub quantity: Option<String>,
    pub expiry: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawRequest {
    pub id: Option<String>,
    #[serde(rename = "requesterEmail")]
    pub requester_email: Option<String>,
    #[serde(rename = "requester_email")]
    pub requester_email_alt: Option<String>,
    #[serde(rename = "orgName")]
    pub org_name: Option<String>,
    #[serde(rename = "org_name")]
    pub org_name_alt: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<RawTimestamp>,
    #[serde(rename = "created_at")]
    pub created_at_alt: Option<RawTimestamp>,
    pub details: Option<RawRequestDetails>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawRequestDetails {
    #[serde(rename = "type")]
    pub food_type: Option<String>,
    pub quantity: Option<String>,
    pub urgency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodType {
    Cooked,
    Raw,
    Other,
}

impl FoodType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "cooked" => FoodType::Cooked,
            "raw" => FoodType::Raw,
            _ => FoodType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Packaging {
    Packed,
    Unpacked,
    Other,
}

impl Packaging {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "packed" => Packaging::Packed,
            "unpacked" => Packaging::Unpacked,
            _ => Packaging::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Immediate,
    Today,
    Week,
    Other,
}

impl Urgency {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Urgency::Immediate,
            "today" => Urgency::Today,
            "week" => Urgency::Week,
            _ => Urgency::Other,
        }
    }
}

/// Lifecycle shared by donations and requests. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Status {
    #[default]
    Pending,
    Approved,
    Picked,
    Delivered,
    /// A label written by some other tool that is not part of the lifecycle.
    Unrecognized,
}

impl Status {
    pub const LIFECYCLE: [Status; 4] = [
        Status::Pending,
        Status::Approved,
        Status::Picked,
        Status::Delivered,
    ];

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Status::Pending,
            "approved" => Status::Approved,
            "picked" => Status::Picked,
            "delivered" => Status::Delivered,
            _ => Status::Unrecognized,
        }
    }

    fn stage(self) -> Option<u8> {
        match self {
            Status::Pending => Some(0),
            Status::Approved => Some(1),
            Status::Picked => Some(2),
            Status::Delivered => Some(3),
            Status::Unrecognized => None,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    /// Re-applying the current status is allowed.
    pub fn can_advance_to(self, next: Status) -> bool {
        match (self.stage(), next.stage()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(cur), Some(nxt)) => nxt >= cur,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Pending => "Pending",
            Status::Approved => "Approved",
            Status::Picked => "Picked",
            Status::Delivered => "Delivered",
            Status::Unrecognized => "Unrecognized",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub food_type: Option<FoodType>,
    #[serde(rename = "packed", skip_serializing_if = "Option::is_none")]
    pub packaging: Option<Packaging>,
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRecord {
    pub id: String,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    /// Epoch milliseconds, assigned once at creation.
    pub created_at: i64,
    pub details: DonationDetails,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub food_type: Option<String>,
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: String,
    pub requester_email: Option<String>,
    pub org_name: Option<String>,
    pub created_at: i64,
    pub details: RequestDetails,
    pub status: Status,
}

/// Reasons a stored row cannot become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    MissingId,
    MissingTimestamp,
}

fn first_present(primary: Option<String>, alt: Option<String>) -> Option<String> {
    primary
        .filter(|s| !s.is_empty())
        .or(alt.filter(|s| !s.is_empty()))
}

impl TryFrom<RawDonation> for DonationRecord {
    type Error = RowRejection;

    fn try_from(row: RawDonation) -> Result<Self, Self::Error> {
        let id = row
            .id
            .filter(|s| !s.trim().is_empty())
            .ok_or(RowRejection::MissingId)?;
        let created_at = row
            .created_at
            .or(row.created_at_alt)
            .and_then(|ts| ts.to_millis())
            .ok_or(RowRejection::MissingTimestamp)?;
        let details = row.details.unwrap_or_default();
        Ok(DonationRecord {
            id,
            donor_name: first_present(row.donor_name, row.donor_name_alt),
            donor_email: first_present(row.donor_email, row.donor_email_alt),
            created_at,
            details: DonationDetails {
                name: details.name,
                food_type: details.food_type.as_deref().map(FoodType::parse),
                packaging: details.packed.as_deref().map(Packaging::parse),
                quantity: details.quantity,
                expiry: details.expiry,
                description: details.description,
            },
            status: row.status.as_deref().map(Status::parse).unwrap_or_default(),
        })
    }
}

impl TryFrom<RawRequest> for RequestRecord {
    type Error = RowRejection;

    fn try_from(row: RawRequest) -> Result<Self, Self::Error> {
        let id = row
            .id
            .filter(|s| !s.trim().is_empty())
            .ok_or(RowRejection::MissingId)?;
        let created_at = row
            .created_at
            .or(row.created_at_alt)
            .and_then(|ts| ts.to_millis())
            .ok_or(RowRejection::MissingTimestamp)?;
        let details = row.details.unwrap_or_default();
        Ok(RequestRecord {
            id,
            requester_email: first_present(row.requester_email, row.requester_email_alt),
            org_name: first_present(row.org_name, row.org_name_alt),
            created_at,
            details: RequestDetails {
                food_type: details.food_type,
                quantity: details.quantity,
                urgency: details.urgency.as_deref().map(Urgency::parse),
            },
            status: row.status.as_deref().map(Status::parse).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    #[tabled(rename = "MealsSavedToday")]
    pub meals_saved_today: u64,
    #[tabled(rename = "ActiveDonors")]
    pub active_donors: usize,
    #[tabled(rename = "OrganizationsHelped")]
    pub organizations_helped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct WeeklyPoint {
    #[serde(rename = "Day")]
    #[tabled(rename = "Day")]
    pub day: String,
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Donations")]
    #[tabled(rename = "Donations")]
    pub donations: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct NamedValue {
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: u64,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        NamedValue {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactView {
    pub weekly: Vec<WeeklyPoint>,
    pub types: Vec<NamedValue>,
    pub top_donors: Vec<NamedValue>,
}

impl ImpactView {
    /// Meals across the whole trailing week.
    pub fn weekly_total(&self) -> u64 {
        self.weekly.iter().map(|p| p.donations).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Tabled)]
pub struct StatusCount {
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: Status,
    #[serde(rename = "Donations")]
    #[tabled(rename = "Donations")]
    pub donations: usize,
    #[serde(rename = "Requests")]
    #[tabled(rename = "Requests")]
    pub requests: usize,
}
