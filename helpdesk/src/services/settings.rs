//! Settings service
//!
//! Persists user preferences as a JSON file in the data directory.

use crate::config::{RefreshInterval, DEFAULT_PAGE_SIZE};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Dashboard preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSettings {
    #[serde(default)]
    pub auto_refresh_enabled: bool,
    /// Seconds; one of 10, 30, 60, 120 or 300
    #[serde(default)]
    pub refresh_interval: RefreshInterval,
    #[serde(default = "default_dashboard_days")]
    pub days: u32,
}

fn default_dashboard_days() -> u32 {
    crate::config::DEFAULT_DASHBOARD_DAYS
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            auto_refresh_enabled: false,
            refresh_interval: RefreshInterval::default(),
            days: default_dashboard_days(),
        }
    }
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub dashboard: DashboardSettings,
    #[serde(default = "default_page_size")]
    pub tickets_page_size: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            dashboard: DashboardSettings::default(),
            tickets_page_size: default_page_size(),
        }
    }
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
    defaults: AppSettings,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join("settings.json"),
            defaults: AppSettings::default(),
        }
    }

    /// Settings written when no file exists yet
    pub fn with_defaults(mut self, defaults: AppSettings) -> Self {
        self.defaults = defaults;
        self
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = self.defaults.clone();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Generic(format!("Failed to serialize settings: {}", e)))?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    pub async fn get_dashboard(&self) -> Result<DashboardSettings> {
        Ok(self.load().await?.dashboard)
    }

    pub async fn update_dashboard(&self, dashboard: DashboardSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.dashboard = dashboard;
        self.save(&settings).await
    }

    pub async fn update_page_size(&self, page_size: u32) -> Result<()> {
        if page_size == 0 {
            return Err(AppError::Config("Page size must be at least 1".to_string()));
        }
        let mut settings = self.load().await?;
        settings.tickets_page_size = page_size;
        self.save(&settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_service() -> (SettingsService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let service = SettingsService::new(temp_dir.path().to_path_buf());
        (service, temp_dir)
    }

    #[tokio::test]
    async fn test_default_settings_created_on_load() {
        let (service, temp) = create_test_service();

        let settings = service.load().await.unwrap();

        assert!(!settings.dashboard.auto_refresh_enabled);
        assert_eq!(settings.dashboard.refresh_interval, RefreshInterval::ThirtySeconds);
        assert_eq!(settings.tickets_page_size, DEFAULT_PAGE_SIZE);
        assert!(temp.path().join("settings.json").exists());
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().to_path_buf();

        {
            let service = SettingsService::new(settings_path.clone());
            service
                .update_dashboard(DashboardSettings {
                    auto_refresh_enabled: true,
                    refresh_interval: RefreshInterval::TwoMinutes,
                    days: 7,
                })
                .await
                .unwrap();
        }

        {
            let service = SettingsService::new(settings_path);
            let loaded = service.get_dashboard().await.unwrap();
            assert!(loaded.auto_refresh_enabled);
            assert_eq!(loaded.refresh_interval, RefreshInterval::TwoMinutes);
            assert_eq!(loaded.days, 7);
        }
    }

    #[tokio::test]
    async fn test_missing_fields_use_defaults() {
        let (service, temp) = create_test_service();
        std::fs::write(
            temp.path().join("settings.json"),
            r#"{"dashboard": {"auto_refresh_enabled": true}}"#,
        )
        .unwrap();

        let settings = service.load().await.unwrap();
        assert!(settings.dashboard.auto_refresh_enabled);
        assert_eq!(settings.dashboard.refresh_interval, RefreshInterval::ThirtySeconds);
        assert_eq!(settings.tickets_page_size, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_unsupported_interval_rejected() {
        let (service, temp) = create_test_service();
        std::fs::write(
            temp.path().join("settings.json"),
            r#"{"dashboard": {"refresh_interval": 45}}"#,
        )
        .unwrap();

        assert!(service.load().await.is_err());
    }

    #[tokio::test]
    async fn test_page_size_preserved_after_dashboard_update() {
        let (service, _temp) = create_test_service();

        service.update_page_size(50).await.unwrap();
        service
            .update_dashboard(DashboardSettings::default())
            .await
            .unwrap();

        assert_eq!(service.load().await.unwrap().tickets_page_size, 50);
        assert!(service.update_page_size(0).await.is_err());
    }
}
