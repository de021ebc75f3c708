use crate::types::{DonationDetails, DonationRecord, RequestDetails, RequestRecord, Status};
use chrono::{TimeZone, Utc};

pub fn utc_ms(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .timestamp_millis()
}

pub fn donation(
    id: &str,
    name: Option<&str>,
    email: Option<&str>,
    quantity: &str,
    created_at: i64,
) -> DonationRecord {
    DonationRecord {
        id: id.to_string(),
        donor_name: name.map(str::to_string),
        donor_email: email.map(str::to_string),
        created_at,
        details: DonationDetails {
            name: None,
            food_type: None,
            packaging: None,
            quantity: Some(quantity.to_string()),
            expiry: None,
            description: None,
        },
        status: Status::Pending,
    }
}

pub fn request(id: &str, org: Option<&str>, email: Option<&str>, created_at: i64) -> RequestRecord {
    RequestRecord {
        id: id.to_string(),
        requester_email: email.map(str::to_string),
        org_name: org.map(str::to_string),
        created_at,
        details: RequestDetails {
            food_type: None,
            quantity: None,
            urgency: None,
        },
        status: Status::Pending,
    }
}
