//! Read-only projection of an item for presentation.

use crate::sweep::is_expired;
use crate::types::{Item, Status};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A dependency as shown to readers: just enough to name it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub id: String,
    pub name: String,
}

impl DependencyRef {
    pub fn of(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
        }
    }
}

/// Snapshot of an item with its derived state.
///
/// Dependents are deliberately absent: only forward edges are flattened, so
/// the projection never serializes the reverse side of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub id: String,
    pub list_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub dependencies: Vec<DependencyRef>,
    pub expired: bool,
    pub can_be_completed: bool,
}

impl ItemView {
    pub fn new(item: &Item, dependencies: Vec<DependencyRef>, can_be_completed: bool, today: NaiveDate) -> Self {
        Self {
            id: item.id.clone(),
            list_id: item.list_id.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            status: item.status,
            deadline: item.deadline,
            created_at: item.created_at,
            completed_at: item.completed_at,
            dependencies,
            expired: is_expired(item, today),
            can_be_completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_derives_expired_from_deadline() {
        let now = Utc::now();
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let item = Item {
            id: "it-1".to_string(),
            list_id: "ls-1".to_string(),
            name: "Pay rent".to_string(),
            description: None,
            status: Status::InProgress,
            deadline: NaiveDate::from_ymd_opt(2025, 3, 1),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let view = ItemView::new(&item, vec![], true, today);
        assert!(view.expired);
        assert!(view.can_be_completed);
        assert_eq!(view.status, Status::InProgress);
    }

    #[test]
    fn test_view_json_has_no_dependents_field() {
        let now = Utc::now();
        let item = Item {
            id: "it-1".to_string(),
            list_id: "ls-1".to_string(),
            name: "A".to_string(),
            description: None,
            status: Status::NotStarted,
            deadline: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        let deps = vec![DependencyRef {
            id: "it-2".to_string(),
            name: "B".to_string(),
        }];
        let json = serde_json::to_value(ItemView::new(&item, deps, false, now.date_naive())).unwrap();
        assert!(json.get("dependents").is_none());
        assert_eq!(json["dependencies"][0]["name"], "B");
        assert_eq!(json["can_be_completed"], false);
    }
}
