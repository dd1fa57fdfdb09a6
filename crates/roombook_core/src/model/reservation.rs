//! Reservation domain model.
//!
//! # Responsibility
//! - Define the reservation record and its three-state lifecycle.
//! - Own the pure interval rules shared by the repository and the manager.
//!
//! # Invariants
//! - `end_time` is strictly after `start_time`.
//! - Two intervals overlap when `a.start < b.end && a.end > b.start`; touching
//!   bounds do not overlap. The repository's conflict scan applies this rule.
//! - `Cancelled` is terminal.

use crate::model::principal::PrincipalId;
use crate::model::room::ResourceId;
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a reservation.
pub type ReservationId = Uuid;

/// Maximum length of `purpose`, counted in characters.
pub const PURPOSE_MAX_CHARS: usize = 500;

/// Reservation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Declared for storage compatibility; nothing produces it.
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Interval validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    /// `start >= end`.
    EmptyRange { start: NaiveTime, end: NaiveTime },
    /// Reservation date lies before the current date.
    PastDate { date: NaiveDate, today: NaiveDate },
}

impl Display for IntervalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRange { start, end } => {
                write!(f, "start time {start} must be before end time {end}")
            }
            Self::PastDate { date, today } => {
                write!(f, "cannot reserve {date}: date is before today ({today})")
            }
        }
    }
}

impl Error for IntervalError {}

/// Canonical reservation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    /// Set at creation and never changed.
    pub resource_id: ResourceId,
    /// Set at creation and never changed.
    pub owner_id: PrincipalId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub purpose: Option<String>,
    pub status: ReservationStatus,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Reservation {
    pub fn is_cancelled(&self) -> bool {
        self.status == ReservationStatus::Cancelled
    }
}

/// Validates a requested date and time range against `today`.
///
/// The range is checked first so a request that is both past-dated and empty
/// reports the range problem.
pub fn validate_interval(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    today: NaiveDate,
) -> Result<(), IntervalError> {
    if start >= end {
        return Err(IntervalError::EmptyRange { start, end });
    }
    if date < today {
        return Err(IntervalError::PastDate { date, today });
    }
    Ok(())
}

/// Drops sub-second precision; times are stored as `HH:MM:SS`.
pub fn truncate_to_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

/// Maps blank `purpose` to `None`; any other text is kept as given.
pub fn normalize_purpose(purpose: Option<String>) -> Option<String> {
    purpose.filter(|value| !value.trim().is_empty())
}
