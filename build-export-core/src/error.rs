use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportApiError {
    #[error("Unable to decode {0} payload: {1}")]
    MalformedPayload(&'static str, serde_json::Error),

    #[error("Invalid process from value `{0}`, expected `now` or milliseconds since the epoch")]
    InvalidProcessFrom(String),

    #[error("Invalid server url `{0}`, expected it to start with http:// or https://")]
    InvalidServerUrl(String),

    #[error("Missing credentials, supply a user and password or an access token")]
    MissingCredentials,

    #[error("Build processor has shut down, unable to accept build {0}")]
    ProcessorShutdown(String),
}
