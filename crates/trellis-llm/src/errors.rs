use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing environment variable {0}")]
    MissingApiKey(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model API returned status {status}: {body}")]
    Api { status: u16, body: String },
}
