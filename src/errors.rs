use thiserror::Error;

/// Error type carrying the process exit code
#[derive(Debug, Error)]
pub enum CukeprobeError {
    /// One or more scenarios failed (exit code 2)
    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },
    /// Bad input: missing feature file, incomplete AI configuration (exit code 3)
    #[error("{0}")]
    InvalidInput(String),
    /// WebDriver connection failed (exit code 4)
    #[error("WebDriver connection failed: {0}")]
    WebDriverFailed(String),
    /// Operation timeout (exit code 5)
    #[error("Operation timed out: {0}")]
    Timeout(String),
    /// Generic error (exit code 1)
    #[error("{0:#}")]
    Other(anyhow::Error),
}

impl CukeprobeError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CukeprobeError::ScenariosFailed { .. } => 2,
            CukeprobeError::InvalidInput(_) => 3,
            CukeprobeError::WebDriverFailed(_) => 4,
            CukeprobeError::Timeout(_) => 5,
            CukeprobeError::Other(_) => 1,
        }
    }
}

impl From<anyhow::Error> for CukeprobeError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<CukeprobeError>() {
            Ok(typed) => return typed,
            Err(err) => err,
        };

        // Untyped errors bubbling out of fantoccini/reqwest are classified by message
        let msg = format!("{:#}", err);
        if msg.contains("Failed to connect to WebDriver")
            || msg.contains("geckodriver")
            || msg.contains("chromedriver")
            || msg.contains("safaridriver")
        {
            CukeprobeError::WebDriverFailed(msg)
        } else if msg.contains("timeout") || msg.contains("timed out") {
            CukeprobeError::Timeout(msg)
        } else {
            CukeprobeError::Other(err)
        }
    }
}

/// Errors from AI completion providers
#[derive(Debug, Error)]
pub enum AiError {
    #[error("{provider} request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} returned no completion text")]
    EmptyResponse { provider: &'static str },
    #[error("Could not parse selector analysis: {0}")]
    Parse(String),
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod errors_test;
