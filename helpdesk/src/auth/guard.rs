//! Route table and navigation guard

use super::role::{RoleRequirement, ROLE_ADMIN, ROLE_TECHNICIAN};
use super::session::SessionState;

/// Pages of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    AuthCallback,
    Unauthorized,
    Dashboard,
    Tickets,
    Filters,
    Profile,
    Users,
    Roles,
    Permissions,
    Floors,
    Areas,
}

impl Route {
    pub const ALL: [Route; 12] = [
        Route::Login,
        Route::AuthCallback,
        Route::Unauthorized,
        Route::Dashboard,
        Route::Tickets,
        Route::Filters,
        Route::Profile,
        Route::Users,
        Route::Roles,
        Route::Permissions,
        Route::Floors,
        Route::Areas,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::AuthCallback => "/auth/callback",
            Route::Unauthorized => "/unauthorized",
            Route::Dashboard => "/",
            Route::Tickets => "/tickets",
            Route::Filters => "/filters",
            Route::Profile => "/profile",
            Route::Users => "/users",
            Route::Roles => "/roles",
            Route::Permissions => "/permissions",
            Route::Floors => "/floors",
            Route::Areas => "/areas",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let trimmed = path.split(['?', '#']).next().unwrap_or(path);
        let trimmed = if trimmed.len() > 1 {
            trimmed.trim_end_matches('/')
        } else {
            trimmed
        };
        Route::ALL.into_iter().find(|route| route.path() == trimmed)
    }

    /// Reachable without a session
    pub fn is_public(self) -> bool {
        matches!(self, Route::Login | Route::AuthCallback | Route::Unauthorized)
    }

    /// Roles required beyond being logged in; `None` admits any role
    pub fn requirement(self) -> Option<RoleRequirement> {
        match self {
            Route::Dashboard => Some(RoleRequirement::any_of(&[ROLE_ADMIN, ROLE_TECHNICIAN])),
            Route::Users | Route::Roles | Route::Permissions | Route::Floors | Route::Areas => {
                Some(RoleRequirement::role(ROLE_ADMIN))
            }
            _ => None,
        }
    }
}

/// What the navigation layer should do for a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session still loading; render nothing and do not redirect yet
    Wait,
    Render,
    RedirectToLogin,
    RedirectToUnauthorized,
}

/// Decide how to handle navigation to `route` in the given session state
pub fn guard(state: &SessionState, route: Route) -> RouteDecision {
    if route.is_public() {
        return RouteDecision::Render;
    }

    match state {
        SessionState::Uninitialized | SessionState::Loading => RouteDecision::Wait,
        SessionState::Anonymous => RouteDecision::RedirectToLogin,
        SessionState::Authenticated(session) => match route.requirement() {
            None => RouteDecision::Render,
            Some(requirement) if requirement.is_satisfied_by(&session.user.role_key()) => {
                RouteDecision::Render
            }
            Some(_) => RouteDecision::RedirectToUnauthorized,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::role::ROLE_END_USER;
    use crate::models::{Session, User};

    fn session(role: &str) -> SessionState {
        SessionState::Authenticated(Session {
            token: "t".to_string(),
            user: User {
                id: 1,
                email: "u@mefasa.com".to_string(),
                name: "U".to_string(),
                role: role.to_string(),
                role_id: None,
                floor_id: None,
                area_id: None,
                two_factor_enabled: false,
                created_at: None,
            },
        })
    }

    #[test]
    fn test_loading_session_waits() {
        assert_eq!(guard(&SessionState::Loading, Route::Users), RouteDecision::Wait);
        assert_eq!(guard(&SessionState::Uninitialized, Route::Tickets), RouteDecision::Wait);
        // Public pages never wait
        assert_eq!(guard(&SessionState::Loading, Route::Login), RouteDecision::Render);
    }

    #[test]
    fn test_anonymous_redirected_to_login() {
        assert_eq!(
            guard(&SessionState::Anonymous, Route::Tickets),
            RouteDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_wrong_role_redirected_to_unauthorized() {
        assert_eq!(
            guard(&session(ROLE_END_USER), Route::Users),
            RouteDecision::RedirectToUnauthorized
        );
        assert_eq!(
            guard(&session(ROLE_END_USER), Route::Dashboard),
            RouteDecision::RedirectToUnauthorized
        );
        assert_eq!(guard(&session(ROLE_END_USER), Route::Tickets), RouteDecision::Render);
        assert_eq!(guard(&session(ROLE_ADMIN), Route::Users), RouteDecision::Render);
        assert_eq!(guard(&session(ROLE_TECHNICIAN), Route::Dashboard), RouteDecision::Render);
    }

    #[test]
    fn test_route_from_path() {
        assert_eq!(Route::from_path("/users/"), Some(Route::Users));
        assert_eq!(Route::from_path("/"), Some(Route::Dashboard));
        assert_eq!(Route::from_path("/auth/callback?token=x"), Some(Route::AuthCallback));
        assert_eq!(Route::from_path("/nowhere"), None);
    }
}
