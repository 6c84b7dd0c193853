//! Identity provider callback
//!
//! The external login flow redirects back to `/auth/callback` with the
//! token, the user record (JSON) and optional two-factor hints in the
//! query string.

use crate::error::{AppError, Result};
use crate::models::{Session, User};
use url::Url;

/// Parsed callback query
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackParams {
    pub token: String,
    pub user: User,
    /// Backend requires two-factor setup before continuing
    pub setup_two_factor: bool,
    /// Backend suggests enabling two-factor
    pub recommend_two_factor: bool,
}

/// Result of completing an external login
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackOutcome {
    pub session: Session,
    /// Show the two-factor setup prompt before entering the app
    pub prompt_two_factor: bool,
}

impl CallbackOutcome {
    pub(crate) fn from_params(params: &CallbackParams) -> Self {
        Self {
            session: params.clone().into_session(),
            prompt_two_factor: (params.setup_two_factor || params.recommend_two_factor)
                && !params.user.two_factor_enabled,
        }
    }
}

impl CallbackParams {
    /// Parse an absolute callback URL or a path with query string.
    ///
    /// A missing token or an unreadable user record is reported as
    /// invalid credentials.
    pub fn from_url(raw: &str) -> Result<Self> {
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://localhost/")?.join(raw)?
            }
            Err(e) => return Err(e.into()),
        };

        let mut token = None;
        let mut user = None;
        let mut setup_two_factor = false;
        let mut recommend_two_factor = false;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "token" => token = Some(value.into_owned()),
                "user" => user = Some(value.into_owned()),
                "setup2fa" => setup_two_factor = is_truthy(&value),
                "recommend2fa" => recommend_two_factor = is_truthy(&value),
                _ => {}
            }
        }

        let token = token.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            tracing::warn!("Login callback is missing the token");
            AppError::InvalidCredentials
        })?;

        let raw_user = user.ok_or_else(|| {
            tracing::warn!("Login callback is missing the user record");
            AppError::InvalidCredentials
        })?;

        let user: User = serde_json::from_str(&raw_user).map_err(|e| {
            tracing::warn!("Login callback user record is malformed: {}", e);
            AppError::InvalidCredentials
        })?;

        Ok(Self {
            token,
            user,
            setup_two_factor,
            recommend_two_factor,
        })
    }

    pub fn into_session(self) -> Session {
        Session {
            token: self.token,
            user: self.user,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "yes")
}
