//! API client error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level or decode failure from the HTTP client.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend returned its error wrapper (`code != 200`).
    #[error("api error {code}: {message}")]
    Api { code: i32, message: String },

    /// A success wrapper arrived with no `data` payload.
    #[error("response missing data")]
    MissingData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = ApiError::Api {
            code: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "api error 404: Not Found");
    }
}
