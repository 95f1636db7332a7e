use base64::{engine::general_purpose, Engine as _};
use std::fmt;

/// Authorization header sent with every stream request, fixed for the lifetime of the process.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthHeader {
    Basic(String),
    Bearer(String),
}

impl AuthHeader {
    pub fn basic(user: &str, password: &str) -> AuthHeader {
        let encoded = general_purpose::STANDARD.encode(format!("{}:{}", user, password));
        AuthHeader::Basic(encoded)
    }

    pub fn bearer(token: &str) -> AuthHeader {
        AuthHeader::Bearer(token.trim().to_string())
    }

    pub fn value(&self) -> String {
        match self {
            AuthHeader::Basic(encoded) => format!("Basic {}", encoded),
            AuthHeader::Bearer(token) => format!("Bearer {}", token),
        }
    }
}

// Credentials end up in logs via {:?} on the connection types otherwise.
impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthHeader::Basic(_) => write!(f, "AuthHeader::Basic(<redacted>)"),
            AuthHeader::Bearer(_) => write!(f, "AuthHeader::Bearer(<redacted>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header() {
        let header = AuthHeader::basic("export", "s3cret");
        assert_eq!(header.value(), "Basic ZXhwb3J0OnMzY3JldA==");
    }

    #[test]
    fn test_bearer_header() {
        let header = AuthHeader::bearer(" abc.def \n");
        assert_eq!(header.value(), "Bearer abc.def");
    }

    #[test]
    fn test_debug_is_redacted() {
        let header = AuthHeader::basic("export", "s3cret");
        let printed = format!("{:?}", header);
        assert!(!printed.contains("ZXhwb3J0"));
    }
}
