use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Configuration(String),

    #[error("Classification service error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Classification service returned an empty response")]
    EmptyResponse,

    #[error("AI returned an invalid response format: {0}")]
    MalformedResponse(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Another grouping operation is in progress.")]
    Busy,

    #[error("{0}")]
    General(String),
}

impl AppError {
    pub fn missing_api_key() -> Self {
        Self::Configuration(
            "OpenAI API Key is not set. Please set it in the options page.".to_string(),
        )
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::EmptyResponse | Self::MalformedResponse(_))
    }

    pub fn capture(self) -> Self {
        tracing::error!("{self}");
        self
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_are_grouped() {
        assert!(AppError::EmptyResponse.is_protocol_error());
        assert!(AppError::MalformedResponse("x".into()).is_protocol_error());
        assert!(!AppError::missing_api_key().is_protocol_error());
        assert!(!AppError::Busy.is_protocol_error());
    }

    #[test]
    fn serializes_as_display_text() {
        let json = serde_json::to_string(&AppError::Busy).unwrap();
        assert_eq!(json, "\"Another grouping operation is in progress.\"");
    }
}
