//! Dashboard service
//!
//! Fetches ticket aggregates and, when enabled, refreshes them on one of
//! the fixed intervals in the background.

use super::settings::DashboardSettings;
use super::TaskGuard;
use crate::api::ApiClient;
use crate::config::{RefreshInterval, DEFAULT_DASHBOARD_DAYS};
use crate::error::Result;
use crate::models::DashboardStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Dashboard aggregates with the last successful result cached
#[derive(Clone)]
pub struct DashboardService {
    api: ApiClient,
    latest: Arc<RwLock<Option<DashboardStats>>>,
    days: u32,
}

/// Running auto-refresh; stops when dropped
pub struct AutoRefresh {
    interval: RefreshInterval,
    _task: TaskGuard,
}

impl AutoRefresh {
    pub fn interval(&self) -> RefreshInterval {
        self.interval
    }
}

impl DashboardService {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            latest: Arc::new(RwLock::new(None)),
            days: DEFAULT_DASHBOARD_DAYS,
        }
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days.max(1);
        self
    }

    /// Fetch fresh stats; a failure keeps the previous result cached
    pub async fn refresh(&self) -> Result<DashboardStats> {
        let stats = self.api.dashboard(self.days).await?;
        *self.latest.write().await = Some(stats.clone());
        Ok(stats)
    }

    pub async fn latest(&self) -> Option<DashboardStats> {
        self.latest.read().await.clone()
    }

    /// Start auto-refresh when the user's dashboard settings ask for it
    pub fn auto_refresh(&self, settings: &DashboardSettings) -> Option<AutoRefresh> {
        if !settings.auto_refresh_enabled {
            return None;
        }
        Some(self.start_auto_refresh(settings.refresh_interval))
    }

    /// Refresh every `interval` until the returned handle is dropped
    pub fn start_auto_refresh(&self, interval: RefreshInterval) -> AutoRefresh {
        tracing::info!("Starting dashboard auto-refresh every {}s", interval.as_secs());

        AutoRefresh {
            interval,
            _task: self.spawn_refresh(interval.as_duration()),
        }
    }

    pub(crate) fn spawn_refresh(&self, period: Duration) -> TaskGuard {
        let service = self.clone();

        TaskGuard::new(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if let Err(e) = service.refresh().await {
                    tracing::error!("Dashboard auto-refresh failed: {}", e);
                }
            }
        }))
    }
}
