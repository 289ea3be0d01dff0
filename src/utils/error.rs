use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatusError { status: u16, url: String },

    #[error("{step} timed out after {millis}ms")]
    TimeoutError { step: String, millis: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Unrecognised time text: '{input}'")]
    TimeParseError { input: String },

    #[error("Navigation failed: {message}")]
    NavigationError { message: String },

    #[error("Browser session error: {message}")]
    SessionError { message: String },

    #[error("Extraction failed for {source_name}: {message}")]
    ExtractionError { source_name: String, message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, ScoutError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Parsing,
    Browser,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ScoutError {
    pub fn timeout(step: impl Into<String>, duration: std::time::Duration) -> Self {
        ScoutError::TimeoutError {
            step: step.into(),
            millis: duration.as_millis() as u64,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ScoutError::HttpError(_)
            | ScoutError::HttpStatusError { .. }
            | ScoutError::TimeoutError { .. } => ErrorCategory::Network,
            ScoutError::SerializationError(_)
            | ScoutError::CsvError(_)
            | ScoutError::TimeParseError { .. }
            | ScoutError::ExtractionError { .. } => ErrorCategory::Parsing,
            ScoutError::NavigationError { .. } | ScoutError::SessionError { .. } => {
                ErrorCategory::Browser
            }
            ScoutError::MissingConfigError { .. }
            | ScoutError::InvalidConfigValueError { .. }
            | ScoutError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ScoutError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 單一來源失敗只會變成報表中的一筆錯誤
            ErrorCategory::Parsing => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Browser => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check connectivity to the booking site and retry later",
            ErrorCategory::Parsing => "The booking page layout may have changed; check the page by hand",
            ErrorCategory::Browser => "Retry; the page may not have finished rendering",
            ErrorCategory::Configuration => "Fix the date, player count, time or sources file and run again",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ScoutError::MissingConfigError { field } => {
                format!("{} is required (set it on the command line or in the environment)", field)
            }
            ScoutError::InvalidConfigValueError { field, value, reason } => {
                format!("'{}' is not a valid {}: {}", value, field, reason)
            }
            ScoutError::TimeoutError { step, .. } => {
                format!("The booking site took too long to respond ({})", step)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_constructor_records_millis() {
        let err = ScoutError::timeout("page load", Duration::from_secs(2));
        assert_eq!(err.to_string(), "page load timed out after 2000ms");
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = ScoutError::MissingConfigError {
            field: "date".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("date is required"));
    }
}
