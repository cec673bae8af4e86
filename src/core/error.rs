use std::io;

#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout")]
    Timeout,
    #[error("http error: {0}")]
    Http(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("whois error: {0}")]
    Whois(String),
    #[error("dns error: {0}")]
    Dns(String),
    #[error("tls error: {0}")]
    Tls(String),
    #[error("oracle error: {0}")]
    Oracle(String),
    #[error("oracle refused: {0}")]
    Blocked(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl VerifyError {
    /// Connection failures are retried. A timed-out attempt has used up the
    /// caller's bound, so `Timeout` is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, VerifyError::Network(_))
    }
}

impl From<reqwest::Error> for VerifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VerifyError::Timeout
        } else if err.is_connect() {
            VerifyError::Network(err.to_string())
        } else if err.is_status() {
            VerifyError::Http(err.to_string())
        } else if err.is_decode() {
            VerifyError::Parse(err.to_string())
        } else {
            VerifyError::Network(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for VerifyError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        VerifyError::Timeout
    }
}
