//! Expiration: the shared `is_expired` predicate and the periodic sweep.
//!
//! The sweep is a pure function over a snapshot of items. Whoever schedules
//! it (the daemon, or `td sweep`) is responsible for persisting the returned
//! items and for holding the store's write serialization while doing so.

use crate::types::{Item, Status};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// True when the item's deadline has passed and it is not completed.
///
/// Used both by the sweep and by read-time projection so that persisted
/// EXPIRED status and the derived `expired` flag never disagree.
pub fn is_expired(item: &Item, today: NaiveDate) -> bool {
    match item.deadline {
        Some(deadline) => item.status != Status::Completed && today > deadline,
        None => false,
    }
}

/// The current calendar day in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// True when the sweep should move this item to EXPIRED.
pub fn needs_expiry(item: &Item, today: NaiveDate) -> bool {
    item.status != Status::Expired && is_expired(item, today)
}

/// Compute the items that become EXPIRED on `today`.
///
/// Consumes items from every list. Returns updated copies; the input is
/// left untouched.
pub fn sweep_expired<'a>(items: impl IntoIterator<Item = &'a Item>, today: NaiveDate, now: DateTime<Utc>) -> Vec<Item> {
    items
        .into_iter()
        .filter(|item| needs_expiry(item, today))
        .map(|item| Item {
            status: Status::Expired,
            updated_at: now,
            ..item.clone()
        })
        .collect()
}

/// Outcome of one sweep pass.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Day the sweep evaluated deadlines against.
    pub today: Option<NaiveDate>,
    /// Number of items examined.
    pub checked: usize,
    /// Items moved to EXPIRED.
    pub expired: Vec<String>,
    /// Items that could not be written (id, error message). Retried next pass.
    pub errors: Vec<(String, String)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
