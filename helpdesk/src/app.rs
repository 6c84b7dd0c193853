//! Application state and initialization
//!
//! This module wires the API client, session store and services around a
//! single event bus. All services are created here and made available
//! through `AppState`.

use crate::api::ApiClient;
use crate::auth::{
    guard, FileStorage, KeyringStorage, Route, RouteDecision, SessionStorage, SessionStore,
};
use crate::config::{ClientConfig, SessionBackend};
use crate::error::{AppError, Result};
use crate::events::EventBus;
use crate::models::{Area, Floor, Permission, Role, User};
use crate::services::{
    AppSettings, AttachmentsService, DashboardService, DashboardSettings, FavoriteFilters,
    FilterComposer, NotificationCenter, ResourceService, SettingsService, TaskGuard,
    TicketsService,
};
use crate::storage::BlobStore;
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub config: ClientConfig,
    pub api: ApiClient,
    pub events: EventBus,
    pub session: SessionStore,
    pub notifications: NotificationCenter,
    pub settings: SettingsService,
    pub tickets: TicketsService,
    pub filters: FilterComposer,
    pub favorites: FavoriteFilters,
    pub users: ResourceService<User>,
    pub roles: ResourceService<Role>,
    pub permissions: ResourceService<Permission>,
    pub floors: ResourceService<Floor>,
    pub areas: ResourceService<Area>,
    pub dashboard: DashboardService,
    pub attachments: AttachmentsService,
}

impl AppState {
    /// Build the state on an explicit session storage backend
    pub fn new(config: ClientConfig, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        let api = ApiClient::from_config(&config)?;
        let events = EventBus::new();
        let notifications = NotificationCenter::with_events(events.clone());

        let tickets = TicketsService::new(ResourceService::new(
            api.clone(),
            notifications.clone(),
            events.clone(),
        ));
        let filters = FilterComposer::new(ResourceService::new(
            api.clone(),
            notifications.clone(),
            events.clone(),
        ));

        let blob_store = BlobStore::new(config.data_dir.join("blobs"));

        Ok(Self {
            session: SessionStore::new(api.clone(), storage, events.clone()),
            favorites: FavoriteFilters::new(api.clone(), notifications.clone(), events.clone()),
            users: ResourceService::new(api.clone(), notifications.clone(), events.clone()),
            roles: ResourceService::new(api.clone(), notifications.clone(), events.clone()),
            permissions: ResourceService::new(api.clone(), notifications.clone(), events.clone()),
            floors: ResourceService::new(api.clone(), notifications.clone(), events.clone()),
            areas: ResourceService::new(api.clone(), notifications.clone(), events.clone()),
            dashboard: DashboardService::new(api.clone()),
            attachments: AttachmentsService::new(api.clone(), blob_store, notifications.clone()),
            settings: SettingsService::new(config.data_dir.clone()).with_defaults(AppSettings {
                dashboard: DashboardSettings {
                    refresh_interval: config.refresh_interval,
                    ..DashboardSettings::default()
                },
                ..AppSettings::default()
            }),
            tickets,
            filters,
            notifications,
            events,
            api,
            config,
        })
    }

    /// Keep every cache in step with the session and with each other.
    ///
    /// Listeners run until the returned guards are dropped.
    pub fn attach_listeners(&self) -> Vec<TaskGuard> {
        vec![
            self.tickets.list().attach(),
            self.filters.filters().attach(),
            self.favorites.attach(),
            self.users.attach(),
            self.roles.attach(),
            self.permissions.attach(),
            self.floors.attach(),
            self.areas.attach(),
        ]
    }

    /// Local route decision, confirmed with the backend's page-access
    /// table for role-restricted pages
    pub async fn check_route(&self, route: Route) -> Result<RouteDecision> {
        let decision = guard(&self.session.state(), route);
        if decision != RouteDecision::Render || route.requirement().is_none() {
            return Ok(decision);
        }

        let Some(role_id) = self.session.current_user().and_then(|user| user.role_id) else {
            return Ok(decision);
        };

        if self.api.check_page_access(role_id, route.path()).await? {
            Ok(RouteDecision::Render)
        } else {
            tracing::info!("Backend denied access to {}", route.path());
            Ok(RouteDecision::RedirectToUnauthorized)
        }
    }
}

fn open_storage(config: &ClientConfig) -> Arc<dyn SessionStorage> {
    match config.session_backend {
        SessionBackend::File => Arc::new(FileStorage::new(config.data_dir.clone())),
        SessionBackend::Keyring => Arc::new(KeyringStorage::new()),
    }
}

/// Application setup - called once on startup
pub async fn setup(config: ClientConfig) -> Result<AppState> {
    tracing::info!("Initializing application");
    tracing::info!("App data directory: {:?}", config.data_dir);
    tracing::info!("Backend API: {}", config.api_base_url);
    if let Some(target) = &config.proxy_target {
        tracing::info!("Backend requests routed through proxy: {}", target);
    }

    // Create necessary directories
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to create {:?}: {}", config.data_dir, e)))?;

    let storage = open_storage(&config);
    let state = AppState::new(config, storage)?;

    state.attachments.blob_store().initialize().await?;
    state.session.initialize().await;

    tracing::info!("Application initialized successfully");

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStorage;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, dir: &TempDir) -> ClientConfig {
        let mut config = ClientConfig::new(server.uri(), dir.path().to_path_buf());
        config.request_timeout = Duration::from_secs(5);
        config
    }

    fn admin_json() -> String {
        serde_json::json!({
            "id": 1, "email": "admin@mefasa.com", "name": "Admin",
            "role": "Administrador", "role_id": 1
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_setup_starts_anonymous_and_creates_dirs() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let state = setup(config(&server, &dir)).await.unwrap();

        assert!(!state.session.is_authenticated());
        assert!(dir.path().join("blobs").exists());
        assert_eq!(
            state.check_route(Route::Tickets).await.unwrap(),
            RouteDecision::RedirectToLogin
        );
    }

    #[tokio::test]
    async fn test_backend_can_veto_page_access() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/permissions/check"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"has_access": false})))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let storage = Arc::new(MemoryStorage::with_entries(&[
            ("token", "t-1"),
            ("user", &admin_json()),
        ]));
        let state = AppState::new(config(&server, &dir), storage).unwrap();
        state.session.initialize().await;

        assert_eq!(
            state.check_route(Route::Users).await.unwrap(),
            RouteDecision::RedirectToUnauthorized
        );
        // Public and role-free pages skip the remote check
        assert_eq!(
            state.check_route(Route::Tickets).await.unwrap(),
            RouteDecision::Render
        );
    }
}
