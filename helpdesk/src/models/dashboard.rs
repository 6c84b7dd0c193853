//! Dashboard aggregates

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Count of tickets sharing one label (a status, a priority, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountEntry {
    pub label: String,
    pub count: i64,
}

/// Tickets created on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub count: i64,
}

/// Summary returned by the dashboard endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_tickets: i64,
    #[serde(default)]
    pub by_status: Vec<CountEntry>,
    #[serde(default)]
    pub by_priority: Vec<CountEntry>,
    #[serde(default)]
    pub tickets_per_day: Vec<SeriesPoint>,
}

impl DashboardStats {
    /// Count for a status label, zero when absent
    pub fn status_count(&self, label: &str) -> i64 {
        self.by_status
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }
}
