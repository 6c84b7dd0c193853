//! Filter composer and favorites
//!
//! The composer validates and saves filters; the backend decides which
//! tickets match. Favorites are tracked separately and are not
//! transactional with filter edits: a deleted filter stays in the
//! favorite set until the next `load`.

use super::notifications::NotificationCenter;
use super::resource::ResourceService;
use super::TaskGuard;
use crate::api::ApiClient;
use crate::error::Result;
use crate::events::{AppEvent, EventBus};
use crate::forms::ValidationErrors;
use crate::models::{Filter, FilterDraft};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock};

/// Builds, validates and persists saved filters
#[derive(Clone)]
pub struct FilterComposer {
    filters: ResourceService<Filter>,
}

impl FilterComposer {
    pub fn new(filters: ResourceService<Filter>) -> Self {
        Self { filters }
    }

    pub fn filters(&self) -> &ResourceService<Filter> {
        &self.filters
    }

    pub fn validate(&self, draft: &FilterDraft) -> std::result::Result<(), ValidationErrors> {
        draft.validate()
    }

    /// Create (`id == None`) or update a filter from the composer state
    pub async fn save(&self, id: Option<i64>, draft: &FilterDraft) -> Result<Filter> {
        let normalized = draft.normalized();
        tracing::info!(
            "Saving filter '{}' with {} criteria",
            normalized.filter_name,
            normalized.criteria.len()
        );

        match id {
            None => self.filters.create(&normalized).await,
            Some(id) => self.filters.update(id, &normalized).await,
        }
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.filters.delete(id).await
    }
}

/// The current user's favorite filter ids
#[derive(Clone)]
pub struct FavoriteFilters {
    api: ApiClient,
    notifications: NotificationCenter,
    events: EventBus,
    favorites: Arc<RwLock<HashSet<i64>>>,
    /// Toggles run one at a time so each sees the previous result
    toggling: Arc<Mutex<()>>,
}

impl FavoriteFilters {
    pub fn new(api: ApiClient, notifications: NotificationCenter, events: EventBus) -> Self {
        Self {
            api,
            notifications,
            events,
            favorites: Arc::new(RwLock::new(HashSet::new())),
            toggling: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the local set with the backend's
    pub async fn load(&self) -> Result<()> {
        let rows = self.api.favorite_filters().await?;
        let ids: HashSet<i64> = rows.into_iter().map(|row| row.filter_id).collect();
        tracing::debug!("Loaded {} favorite filters", ids.len());
        *self.favorites.write().await = ids;
        Ok(())
    }

    pub async fn is_favorite(&self, filter_id: i64) -> bool {
        self.favorites.read().await.contains(&filter_id)
    }

    /// Sorted favorite ids
    pub async fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.favorites.read().await.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn clear(&self) {
        self.favorites.write().await.clear();
    }

    /// Flip favorite status; returns whether the filter is now a favorite
    pub async fn toggle(&self, filter_id: i64) -> Result<bool> {
        let _turn = self.toggling.lock().await;

        let was_favorite = self.is_favorite(filter_id).await;
        let result = if was_favorite {
            self.api.remove_favorite(filter_id).await
        } else {
            self.api.add_favorite(filter_id).await.map(|_| ())
        };

        if let Err(e) = result {
            self.notifications
                .error(format!("Could not update favorite filter: {}", e));
            return Err(e);
        }

        let favorite = !was_favorite;
        {
            let mut favorites = self.favorites.write().await;
            if favorite {
                favorites.insert(filter_id);
            } else {
                favorites.remove(&filter_id);
            }
        }

        self.events.publish(AppEvent::FavoritesChanged {
            filter_id,
            favorite,
        });

        Ok(favorite)
    }

    /// Reload on session start, forget on session end
    pub fn attach(&self) -> TaskGuard {
        let favorites = self.clone();
        let mut rx = self.events.subscribe();

        TaskGuard::new(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(AppEvent::SessionCleared | AppEvent::LoggedOut) => favorites.clear().await,
                    Ok(AppEvent::SessionEstablished { .. }) | Err(RecvError::Lagged(_)) => {
                        if let Err(e) = favorites.load().await {
                            tracing::warn!("Failed to load favorite filters: {}", e);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CriterionDraft, FilterField, Operator};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_save_sends_normalized_filter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/filters"))
            .and(body_partial_json(serde_json::json!({"filter_name": "Sin asignar"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 8,
                "filter_name": "Sin asignar",
                "filterCriteria": [],
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/filters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let composer = FilterComposer::new(ResourceService::new(
            api(&server),
            NotificationCenter::new(),
            EventBus::new(),
        ));
        let draft = FilterDraft::new(" Sin asignar ")
            .with_criterion(CriterionDraft::new(FilterField::AssignedTo, Operator::IsNull, "x"));

        let saved = composer.save(None, &draft).await.unwrap();
        assert_eq!(saved.id, 8);
    }

    #[tokio::test]
    async fn test_invalid_filter_rejected_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/filters"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let composer = FilterComposer::new(ResourceService::new(
            api(&server),
            NotificationCenter::new(),
            EventBus::new(),
        ));

        assert!(composer.save(None, &FilterDraft::new("Vacio")).await.is_err());
        assert!(composer.validate(&FilterDraft::new("Vacio")).is_err());
    }

    #[tokio::test]
    async fn test_failed_toggle_keeps_state_and_notifies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/filters/favorites"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifications = NotificationCenter::new();
        let favorites = FavoriteFilters::new(api(&server), notifications.clone(), EventBus::new());

        assert!(favorites.toggle(3).await.is_err());
        assert!(!favorites.is_favorite(3).await);
        assert_eq!(notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_load_replaces_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/filters/favorites"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "user_id": 9, "filter_id": 5},
                {"id": 2, "user_id": 9, "filter_id": 2}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/filters/favorites/5"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/filters/favorites"))
            .and(body_partial_json(serde_json::json!({"filter_id": 5})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 3, "user_id": 9, "filter_id": 5})),
            )
            .mount(&server)
            .await;

        let favorites = FavoriteFilters::new(api(&server), NotificationCenter::new(), EventBus::new());
        favorites.load().await.unwrap();
        assert_eq!(favorites.ids().await, vec![2, 5]);

        assert!(!favorites.toggle(5).await.unwrap());
        assert!(favorites.toggle(5).await.unwrap());
        assert_eq!(favorites.ids().await, vec![2, 5]);
    }
}
