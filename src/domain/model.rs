use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A time-of-day label on the daily schedule grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub hour: u32,
    pub minute: u32,
}

impl TimeSlot {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    pub fn minutes_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn from_minutes_of_day(minutes: u32) -> Self {
        Self {
            hour: minutes / 60,
            minute: minutes % 60,
        }
    }

    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0)
    }
}

impl From<NaiveTime> for TimeSlot {
    fn from(time: NaiveTime) -> Self {
        Self::new(time.hour(), time.minute())
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinition {
    pub id: String,
    pub name: String,
    #[serde(alias = "duration_minutes")]
    pub duration_minutes: u32,
}

impl ClassDefinition {
    pub fn new(id: &str, name: &str, duration_minutes: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            duration_minutes,
        }
    }
}

/// A persisted reservation. Instances are never mutated after the store returns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    pub subject_id: String,
    pub class_id: String,
    pub start_instant: DateTime<Utc>,
    pub end_instant: DateTime<Utc>,
}

impl Reservation {
    pub fn interval(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start_instant, self.end_instant)
    }
}

/// A conflict-free candidate submitted to a store, which assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    pub subject_id: String,
    pub class_id: String,
    pub start_instant: DateTime<Utc>,
    pub end_instant: DateTime<Utc>,
}

impl NewReservation {
    pub fn with_id(self, id: String) -> Reservation {
        Reservation {
            id,
            subject_id: self.subject_id,
            class_id: self.class_id,
            start_instant: self.start_instant,
            end_instant: self.end_instant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessWindow {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessDecision {
    Allowed,
    Denied,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::Allowed => write!(f, "ALLOWED"),
            AccessDecision::Denied => write!(f, "DENIED"),
        }
    }
}

/// The raw fields carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFields {
    pub subject_id: String,
    pub class_id: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub fields: TokenFields,
    pub checksum: u8,
    pub text: String,
    pub hex: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreTier {
    Primary,
    Fallback,
}

/// Outcome of a committed booking.
#[derive(Debug, Clone)]
pub struct Booking {
    pub reservation: Reservation,
    pub token: AccessToken,
    pub stored_in: StoreTier,
}
