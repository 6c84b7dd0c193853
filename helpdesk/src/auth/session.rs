//! Session store
//!
//! Single source of truth for who is logged in. State moves
//! `Uninitialized -> Loading -> Authenticated | Anonymous` and every
//! transition is published on a watch channel. Lifecycle events go out
//! on the event bus so other components can drop per-user caches.
//!
//! Only this store writes the persisted token and user record.

use super::callback::{CallbackOutcome, CallbackParams};
use super::guard::Route;
use super::role::{AccessDecision, RoleRequirement};
use super::storage::SessionStorage;
use crate::api::ApiClient;
use crate::config::{RELOGIN_DELAY_MS, TOKEN_KEY, USER_KEY};
use crate::error::Result;
use crate::events::{AppEvent, EventBus};
use crate::models::{Credentials, Session, User};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Authentication state as seen by the rest of the application
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Uninitialized,
    Loading,
    Authenticated(Session),
    Anonymous,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// True until the persisted session has been read
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Uninitialized | SessionState::Loading)
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.session().map(|session| &session.user)
    }

    /// Evaluate a role requirement, withholding judgement while loading
    pub fn access(&self, requirement: &RoleRequirement) -> AccessDecision {
        if self.is_loading() {
            return AccessDecision::Pending;
        }

        if super::role::has_role(self.user(), requirement) {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied
        }
    }
}

/// Owner of the current session
#[derive(Clone)]
pub struct SessionStore {
    api: ApiClient,
    storage: Arc<dyn SessionStorage>,
    events: EventBus,
    state: Arc<watch::Sender<SessionState>>,
    /// Serializes login, logout and reloads
    transition: Arc<Mutex<()>>,
    relogin_delay: Duration,
}

impl SessionStore {
    pub fn new(api: ApiClient, storage: Arc<dyn SessionStorage>, events: EventBus) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            api,
            storage,
            events,
            state: Arc::new(state),
            transition: Arc::new(Mutex::new(())),
            relogin_delay: Duration::from_millis(RELOGIN_DELAY_MS),
        }
    }

    pub fn with_relogin_delay(mut self, delay: Duration) -> Self {
        self.relogin_delay = delay;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn access(&self, requirement: &RoleRequirement) -> AccessDecision {
        self.state.borrow().access(requirement)
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    /// Restore the persisted session, if any.
    ///
    /// Anything short of a token plus a parseable user record counts as
    /// no session; leftovers are wiped so they cannot resurface later.
    pub async fn initialize(&self) -> SessionState {
        let _guard = self.transition.lock().await;

        self.set_state(SessionState::Loading);

        match self.read_persisted().await {
            Some(session) => {
                tracing::info!("Restored session for user {}", session.user.id);
                self.api.set_token(Some(session.token.clone()));
                let user_id = session.user.id;
                self.set_state(SessionState::Authenticated(session));
                self.events.publish(AppEvent::SessionEstablished { user_id });
            }
            None => {
                tracing::info!("No stored session, starting anonymous");
                self.wipe_storage().await;
                self.api.set_token(None);
                self.set_state(SessionState::Anonymous);
            }
        }

        self.state()
    }

    /// Authenticate and make the result the current session.
    ///
    /// On failure nothing changes and the error is the generic
    /// invalid-credentials one (or a transport error).
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let _guard = self.transition.lock().await;

        tracing::info!("Logging in");
        let session = self.api.login(credentials).await?;

        self.switch_to(session.clone(), true).await?;
        tracing::info!("Logged in as user {}", session.user.id);

        Ok(session)
    }

    /// Finish a redirect-based login from the identity provider
    pub async fn complete_external_login(&self, params: CallbackParams) -> Result<CallbackOutcome> {
        let _guard = self.transition.lock().await;

        let outcome = CallbackOutcome::from_params(&params);
        self.switch_to(params.into_session(), true).await?;
        tracing::info!(
            "External login completed for user {} (prompt 2FA setup: {})",
            outcome.session.user.id,
            outcome.prompt_two_factor
        );

        Ok(outcome)
    }

    /// Drop the session everywhere. Always succeeds, safe to repeat.
    pub async fn logout(&self) -> Route {
        let _guard = self.transition.lock().await;

        tracing::info!("Logging out");
        self.clear().await;
        self.events.publish(AppEvent::LoggedOut);

        Route::Login
    }

    /// React to the persisted session changing underneath us
    pub async fn reload_from_storage(&self) -> SessionState {
        let _guard = self.transition.lock().await;

        match self.read_persisted().await {
            Some(session) => {
                let unchanged = self.state.borrow().session() == Some(&session);
                if !unchanged {
                    tracing::info!("Stored session changed, switching to user {}", session.user.id);
                    // Already persisted by whoever changed it; a failure here is not ours to report
                    if let Err(e) = self.switch_to(session, false).await {
                        tracing::warn!("Failed to adopt stored session: {}", e);
                    }
                }
            }
            None => {
                if self.is_authenticated() {
                    tracing::info!("Stored session removed, logging out");
                    self.clear().await;
                    self.events.publish(AppEvent::LoggedOut);
                }
            }
        }

        self.state()
    }

    /// Clear any other user's session, then install `session`
    async fn switch_to(&self, session: Session, persist: bool) -> Result<()> {
        let previous_user = self.state.borrow().user().map(|user| user.id);

        if let Some(previous) = previous_user {
            if previous != session.user.id {
                tracing::info!(
                    "Different user logging in ({} -> {}), clearing previous session",
                    previous,
                    session.user.id
                );
                self.clear().await;
                tokio::time::sleep(self.relogin_delay).await;
            }
        }

        if persist {
            self.storage.set(TOKEN_KEY, &session.token).await?;
            self.storage
                .set(USER_KEY, &serde_json::to_string(&session.user)?)
                .await?;
        }

        self.api.set_token(Some(session.token.clone()));
        let user_id = session.user.id;
        self.set_state(SessionState::Authenticated(session));
        self.events.publish(AppEvent::SessionEstablished { user_id });

        Ok(())
    }

    /// Forget the session in memory and in storage
    async fn clear(&self) {
        self.wipe_storage().await;
        self.api.set_token(None);
        self.set_state(SessionState::Anonymous);
        self.events.publish(AppEvent::SessionCleared);
    }

    async fn wipe_storage(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key).await {
                tracing::warn!("Failed to remove {} from session storage: {}", key, e);
            }
        }
    }

    async fn read_persisted(&self) -> Option<Session> {
        let token = self.read_key(TOKEN_KEY).await?;
        let raw_user = self.read_key(USER_KEY).await?;

        if token.trim().is_empty() {
            return None;
        }

        match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => Some(Session { token, user }),
            Err(e) => {
                tracing::warn!("Stored user record is malformed: {}", e);
                None
            }
        }
    }

    async fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read {} from session storage: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::role::{ROLE_ADMIN, ROLE_TECHNICIAN};
    use crate::auth::storage::MemoryStorage;
    use crate::error::AppError;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ANA: &str = r#"{"id":1,"email":"ana@mefasa.com","name":"Ana","role":"Administrador"}"#;

    fn store_with(storage: MemoryStorage, base_url: &str) -> SessionStore {
        let api = ApiClient::new(base_url, Duration::from_secs(5)).unwrap();
        SessionStore::new(api, Arc::new(storage), EventBus::new())
            .with_relogin_delay(Duration::from_millis(50))
    }

    async fn mount_login(server: &MockServer, email: &str, id: i64, role: &str) {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_partial_json(serde_json::json!({ "email": email })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": format!("token-{}", id),
                "user": {"id": id, "email": email, "name": email, "role": role}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_initialize_restores_valid_session() {
        let storage = MemoryStorage::with_entries(&[("token", "abc"), ("user", ANA)]);
        let store = store_with(storage, "http://localhost:1");

        let state = store.initialize().await;

        assert!(state.is_authenticated());
        assert_eq!(store.current_user().unwrap().name, "Ana");
        assert_eq!(
            store.access(&RoleRequirement::role(ROLE_ADMIN)),
            AccessDecision::Allowed
        );
    }

    #[tokio::test]
    async fn test_orphan_token_cleared() {
        let storage = MemoryStorage::with_entries(&[("token", "abc")]);
        let store = store_with(storage.clone(), "http://localhost:1");

        let state = store.initialize().await;

        assert_eq!(state, SessionState::Anonymous);
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_user_treated_as_absent() {
        let storage = MemoryStorage::with_entries(&[("token", "abc"), ("user", "{broken")]);
        let store = store_with(storage.clone(), "http://localhost:1");

        assert_eq!(store.initialize().await, SessionState::Anonymous);
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_access_pending_until_initialized() {
        let store = store_with(MemoryStorage::new(), "http://localhost:1");
        let requirement = RoleRequirement::role(ROLE_ADMIN);

        assert_eq!(store.access(&requirement), AccessDecision::Pending);
        store.initialize().await;
        assert_eq!(store.access(&requirement), AccessDecision::Denied);
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let server = MockServer::start().await;
        mount_login(&server, "ana@mefasa.com", 1, ROLE_ADMIN).await;

        let storage = MemoryStorage::new();
        let store = store_with(storage.clone(), &server.uri());
        store.initialize().await;

        let session = store
            .login(&Credentials::new("ana@mefasa.com", "pw"))
            .await
            .unwrap();

        assert_eq!(session.token, "token-1");
        assert!(store.is_authenticated());
        let snapshot = storage.snapshot();
        assert_eq!(snapshot.get("token").map(String::as_str), Some("token-1"));
        let stored: User = serde_json::from_str(&snapshot["user"]).unwrap();
        assert_eq!(stored.id, 1);
    }

    #[tokio::test]
    async fn test_failed_login_leaves_state_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let storage = MemoryStorage::with_entries(&[("token", "abc"), ("user", ANA)]);
        let store = store_with(storage.clone(), &server.uri());
        store.initialize().await;
        let before = store.state();

        let err = store
            .login(&Credentials::new("bob@mefasa.com", "nope"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidCredentials));
        assert_eq!(store.state(), before);
        assert_eq!(storage.snapshot().get("token").map(String::as_str), Some("abc"));
    }

    #[tokio::test]
    async fn test_switching_users_passes_through_cleared_state() {
        let server = MockServer::start().await;
        mount_login(&server, "ana@mefasa.com", 1, ROLE_ADMIN).await;
        mount_login(&server, "luis@mefasa.com", 2, ROLE_TECHNICIAN).await;

        let store = store_with(MemoryStorage::new(), &server.uri());
        store.initialize().await;
        store
            .login(&Credentials::new("ana@mefasa.com", "pw"))
            .await
            .unwrap();

        let mut rx = store.subscribe();
        rx.borrow_and_update();

        let switching = {
            let store = store.clone();
            tokio::spawn(async move { store.login(&Credentials::new("luis@mefasa.com", "pw")).await })
        };

        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_authenticated());

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().user().map(|u| u.id), Some(2));

        switching.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let storage = MemoryStorage::with_entries(&[("token", "abc"), ("user", ANA)]);
        let store = store_with(storage.clone(), "http://localhost:1");
        store.initialize().await;

        assert_eq!(store.logout().await, Route::Login);
        assert_eq!(store.logout().await, Route::Login);
        assert_eq!(store.state(), SessionState::Anonymous);
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_reload_follows_external_changes() {
        let storage = MemoryStorage::with_entries(&[("token", "abc"), ("user", ANA)]);
        let store = store_with(storage.clone(), "http://localhost:1");
        store.initialize().await;

        storage.remove("user").await.unwrap();
        assert_eq!(store.reload_from_storage().await, SessionState::Anonymous);

        let luis = r#"{"id":2,"email":"luis@mefasa.com","name":"Luis","role":"Tecnico"}"#;
        storage.set("token", "def").await.unwrap();
        storage.set("user", luis).await.unwrap();
        let state = store.reload_from_storage().await;
        assert_eq!(state.user().map(|u| u.id), Some(2));
    }
}
