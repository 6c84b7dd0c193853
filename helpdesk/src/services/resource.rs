//! Generic resource service
//!
//! One service per backend collection, exposing `{ data, loading, error }`
//! plus fetch and create/update/delete.
//!
//! A failed mutation raises one error notification and leaves `data`
//! untouched. Responses are applied in arrival order, so a slow fetch
//! can overwrite a newer one.

use super::notifications::NotificationCenter;
use super::TaskGuard;
use crate::api::ApiClient;
use crate::error::{AppError, Result};
use crate::events::{AppEvent, ChangeKind, EventBus};
use crate::models::Resource;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Observable state of one collection
#[derive(Debug, Clone)]
pub struct ResourceState<R> {
    pub data: Vec<R>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<R> Default for ResourceState<R> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// Fetch/mutate wrapper around one backend collection
pub struct ResourceService<R: Resource> {
    api: ApiClient,
    notifications: NotificationCenter,
    events: EventBus,
    state: Arc<RwLock<ResourceState<R>>>,
    instance: Uuid,
}

impl<R: Resource> Clone for ResourceService<R> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            notifications: self.notifications.clone(),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
            instance: self.instance,
        }
    }
}

impl<R: Resource> ResourceService<R> {
    pub fn new(api: ApiClient, notifications: NotificationCenter, events: EventBus) -> Self {
        Self {
            api,
            notifications,
            events,
            state: Arc::new(RwLock::new(ResourceState::default())),
            instance: Uuid::new_v4(),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub(crate) fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub async fn snapshot(&self) -> ResourceState<R> {
        self.state.read().await.clone()
    }

    pub async fn data(&self) -> Vec<R> {
        self.state.read().await.data.clone()
    }

    /// Load the collection, replacing whatever is shown
    pub async fn fetch(&self) -> Result<Vec<R>> {
        self.state.write().await.loading = true;

        let result = self.api.list::<R>().await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(items) => {
                tracing::debug!("Fetched {} {}", items.len(), R::KIND);
                state.data = items.clone();
                state.error = None;
                Ok(items)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", R::KIND, e);
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn refetch(&self) -> Result<Vec<R>> {
        self.fetch().await
    }

    /// Validate and create; returns the created record
    pub async fn create(&self, draft: &R::Draft) -> Result<R> {
        R::validate(draft)?;

        let created = self
            .mutation("create", self.api.create::<R>(draft))
            .await?;
        self.after_mutation(ChangeKind::Created, Some(created.id()))
            .await;

        Ok(created)
    }

    pub async fn update(&self, id: i64, draft: &R::Draft) -> Result<R> {
        R::validate(draft)?;

        let updated = self
            .mutation("update", self.api.update::<R>(id, draft))
            .await?;
        self.after_mutation(ChangeKind::Updated, Some(id)).await;

        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.mutation("delete", self.api.delete::<R>(id)).await?;
        self.after_mutation(ChangeKind::Deleted, Some(id)).await;

        Ok(())
    }

    /// Drop cached data (on logout or user switch)
    pub async fn clear(&self) {
        *self.state.write().await = ResourceState::default();
    }

    /// Keep this service in sync with the event bus.
    ///
    /// Clears on session clear, loads on session start, and refetches
    /// when another component changes the same collection.
    pub fn attach(&self) -> TaskGuard {
        let service = self.clone();
        let mut rx = self.events.subscribe();

        TaskGuard::new(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => service.handle_event(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("{} listener missed {} events, refetching", R::KIND, missed);
                        let _ = service.fetch().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }

    async fn handle_event(&self, event: AppEvent) {
        match event {
            AppEvent::SessionCleared | AppEvent::LoggedOut => self.clear().await,
            AppEvent::SessionEstablished { .. } => {
                let _ = self.fetch().await;
            }
            AppEvent::ResourceChanged { kind, origin, .. }
                if kind == R::KIND && origin != Some(self.instance) =>
            {
                let _ = self.fetch().await;
            }
            _ => {}
        }
    }

    async fn mutation<T, F>(&self, action: &str, call: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match call.await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.notifications
                    .error(failure_message(action, R::KIND.singular(), &e));
                Err(e)
            }
        }
    }

    async fn after_mutation(&self, change: ChangeKind, id: Option<i64>) {
        tracing::info!("{} {:?}: {:?}", R::KIND.singular(), change, id);

        self.events.publish(AppEvent::ResourceChanged {
            kind: R::KIND,
            change,
            id,
            origin: Some(self.instance),
        });

        // The mutation itself succeeded; a failed refresh only marks the list stale
        let _ = self.fetch().await;
    }
}

pub(crate) fn failure_message(action: &str, noun: &str, error: &AppError) -> String {
    match error {
        AppError::Http(_) => format!("Could not {} {}: the server is unreachable", action, noun),
        other => format!("Could not {} {}: {}", action, noun, other),
    }
}
