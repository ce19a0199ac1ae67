use thiserror::Error;

/// Substrings (matched lowercase) that mark a transport failure as a rejected key.
const INVALID_CREDENTIAL_MARKERS: [&str; 3] = ["api key not valid", "400", "invalid_argument"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("No Gemini API key is configured")]
    CredentialMissing,
    #[error("Gemini rejected the configured API key")]
    InvalidCredential,
    #[error("{0}")]
    GenerationFailed(String),
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Maps a transport or endpoint failure message onto the error taxonomy.
    pub fn from_transport(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if INVALID_CREDENTIAL_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            GenerationError::InvalidCredential
        } else {
            GenerationError::GenerationFailed(message)
        }
    }

    pub fn is_credential_problem(&self) -> bool {
        matches!(
            self,
            GenerationError::CredentialMissing | GenerationError::InvalidCredential
        )
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Expected an image file, got {0}")]
    NotAnImage(String),
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },
    #[error("Unknown {field} option '{value}'")]
    UnknownOption { field: &'static str, value: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl InputError {
    pub fn out_of_range<T: ToString>(field: &'static str, value: T, min: T, max: T) -> Self {
        InputError::OutOfRange {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_key_messages_become_invalid_credential() {
        let err = GenerationError::from_transport(
            "Gemini request failed with status 400 Bad Request: API key not valid. Please pass a valid API key.",
        );
        assert_eq!(err, GenerationError::InvalidCredential);

        let err = GenerationError::from_transport("INVALID_ARGUMENT: bad request");
        assert_eq!(err, GenerationError::InvalidCredential);
    }

    #[test]
    fn other_failures_keep_their_detail() {
        let err = GenerationError::from_transport(
            "Gemini request failed with status 503 Service Unavailable: overloaded",
        );
        assert_eq!(
            err,
            GenerationError::GenerationFailed(
                "Gemini request failed with status 503 Service Unavailable: overloaded".to_string()
            )
        );
        assert!(!err.is_credential_problem());
    }
}
