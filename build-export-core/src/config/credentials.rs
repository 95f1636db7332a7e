use serde::Deserialize;

use crate::{auth::AuthHeader, ExportApiError};

#[derive(Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Credentials {
    Basic { user: String, password: String },
    Bearer { token: String },
}

impl Credentials {
    /// An access token wins over a user and password when both are present.
    pub fn from_parts(
        user: Option<String>,
        password: Option<String>,
        token: Option<String>,
    ) -> Option<Credentials> {
        if let Some(token) = token {
            return Some(Credentials::Bearer { token });
        }
        match (user, password) {
            (Some(user), Some(password)) => Some(Credentials::Basic { user, password }),
            _ => None,
        }
    }

    pub fn auth_header(&self) -> AuthHeader {
        match self {
            Credentials::Basic { user, password } => AuthHeader::basic(user, password),
            Credentials::Bearer { token } => AuthHeader::bearer(token),
        }
    }
}

pub fn auth_header_for(credentials: Option<&Credentials>) -> Result<AuthHeader, ExportApiError> {
    credentials
        .map(|c| c.auth_header())
        .ok_or(ExportApiError::MissingCredentials)
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}
