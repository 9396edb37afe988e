//! ID generation for lists and items.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Prefix for list ids.
pub const LIST_PREFIX: &str = "ls";

/// Prefix for item ids.
pub const ITEM_PREFIX: &str = "it";

/// Generate a unique ID from content + entropy.
/// Format: prefix + "-" + 10 hex chars of SHA256(name + timestamp + random)
pub fn generate_id(prefix: &str, name: &str, created_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(name.as_bytes());
    hasher.update(created_at.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(rand::rng().random::<[u8; 8]>());
    let hash = hasher.finalize();
    format!(
        "{}-{:010x}",
        prefix,
        u64::from_be_bytes([hash[0], hash[1], hash[2], hash[3], hash[4], 0, 0, 0]) >> 24
    )
}

/// Generate an id for a new list.
pub fn list_id(name: &str, created_at: DateTime<Utc>) -> String {
    generate_id(LIST_PREFIX, name, created_at)
}

/// Generate an id for a new item.
pub fn item_id(name: &str, created_at: DateTime<Utc>) -> String {
    generate_id(ITEM_PREFIX, name, created_at)
}
