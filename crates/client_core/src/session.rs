//! Explicit session context handed to the REST client.

use shared::{domain::Role, protocol::UserProfile};
use url::Url;

use crate::error::ClientError;

const API_PREFIX: [&str; 2] = ["api", "v1"];

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    base_url: Url,
    token: Option<String>,
    user: Option<UserProfile>,
}

impl Session {
    /// `base_url` is the backend root, e.g. `http://localhost:8001`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidInput(format!(
                "'{base_url}' cannot be used as an API base url"
            )));
        }
        Ok(Self {
            base_url,
            token: None,
            user: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|user| user.role == Role::Admin)
    }

    /// Resolves `segments` under `<base>/api/v1`. Each segment is escaped on
    /// its own, so task names with spaces or slashes stay a single segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                ClientError::InvalidInput(format!("'{}' has no path", self.base_url))
            })?;
            path.pop_if_empty();
            path.extend(API_PREFIX);
            path.extend(segments);
        }
        Ok(url)
    }

    pub(crate) fn sign_in(&mut self, token: String, user: UserProfile) {
        self.token = Some(token);
        self.user = Some(user);
    }

    pub(crate) fn set_user(&mut self, user: UserProfile) {
        self.user = Some(user);
    }

    pub fn clear(&mut self) {
        self.token = None;
        self.user = None;
    }
}
