use super::{Credentials, RetryPolicy};
use crate::{export_api::ProcessFrom, ExportApiError};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize, Debug, PartialEq, Eq)]
pub struct Config {
    /// Address of the build server, e.g. https://ge.example.com
    #[serde(default, deserialize_with = "parse_server_url")]
    pub server_url: Option<String>,

    /// How many builds to stream at one time.
    /// With a very fast connection to the server this can be raised for better throughput.
    #[serde(default = "default_max_concurrent_builds")]
    pub max_concurrent_builds: usize,

    /// Publication time from which builds get processed, `"now"` or milliseconds since the epoch.
    #[serde(default)]
    pub process_from: ProcessFrom,

    #[serde(rename = "Credentials", default)]
    pub credentials: Option<Credentials>,

    #[serde(rename = "DiscoveryRetry", default = "RetryPolicy::discovery")]
    pub discovery_retry: RetryPolicy,

    #[serde(rename = "BuildRetry", default = "RetryPolicy::per_build")]
    pub build_retry: RetryPolicy,
}

fn default_max_concurrent_builds() -> usize {
    6
}

// We want to use the serde configured defaults for our default implemenation to not be
// building up two separate paths.
impl Default for Config {
    fn default() -> Self {
        super::parse_config("").unwrap()
    }
}

/// Accepts http(s) urls only, without a trailing slash.
pub fn validate_server_url(url: &str) -> Result<String, ExportApiError> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(ExportApiError::InvalidServerUrl(url.to_string()))
    }
}

fn parse_server_url<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;

    match s {
        Some(s) => validate_server_url(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_parse() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.server_url, None);
        assert_eq!(config.max_concurrent_builds, 6);
        assert_eq!(config.process_from, ProcessFrom::Now);
        assert_eq!(config.credentials, None);
        assert_eq!(config.discovery_retry, RetryPolicy::discovery());
        assert_eq!(config.build_retry, RetryPolicy::per_build());
    }

    #[test]
    fn test_full_parse() {
        let config: Config = toml::from_str(
            r#"
        server_url = "https://ge.example.com/"
        max_concurrent_builds = 12
        process_from = 1600000000000

        [Credentials]
        type = "Basic"
        user = "export"
        password = "s3cret"

        [DiscoveryRetry]
        max_retries = 10
        retry_interval_ms = 500

        [BuildRetry]
        max_retries = 7
        "#,
        )
        .unwrap();

        assert_eq!(config.server_url.as_deref(), Some("https://ge.example.com"));
        assert_eq!(config.max_concurrent_builds, 12);
        assert_eq!(config.process_from, ProcessFrom::EpochMillis(1600000000000));
        assert_eq!(
            config.credentials,
            Some(Credentials::Basic {
                user: String::from("export"),
                password: String::from("s3cret")
            })
        );
        assert_eq!(
            config.discovery_retry,
            RetryPolicy::new(10, Duration::from_millis(500))
        );
        assert_eq!(
            config.build_retry,
            RetryPolicy::new(7, Duration::from_millis(1000))
        );
    }

    #[test]
    fn test_bearer_and_now() {
        let config: Config = toml::from_str(
            r#"
        process_from = "now"

        [Credentials]
        type = "Bearer"
        token = "abc"
        "#,
        )
        .unwrap();

        assert_eq!(config.process_from, ProcessFrom::Now);
        assert_eq!(
            config.credentials,
            Some(Credentials::Bearer {
                token: String::from("abc")
            })
        );
    }

    #[test]
    fn test_bad_server_url() {
        let res: Result<Config, _> = toml::from_str(r#"server_url = "ge.example.com""#);
        assert!(res.is_err());
    }
}
