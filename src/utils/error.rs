use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Invalid duration: {minutes} minutes (must be greater than zero)")]
    InvalidDuration { minutes: i64 },

    #[error("Invalid grace period: {minutes} minutes (must not be negative)")]
    InvalidGrace { minutes: i64 },

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration parsing error: {message}")]
    ConfigParse { message: String },

    #[error("Missing required input: {field}")]
    MissingInput { field: String },

    #[error("Unknown class: {class_id}")]
    UnknownClass { class_id: String },

    #[error("Start time {start} is not on the schedule grid")]
    InvalidSlot { start: String },

    #[error("Reservation overlaps an existing reservation: {detail}")]
    OverlappingReservation { detail: String },

    #[error("Reservation store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Reservation could not be persisted: {message}")]
    PersistenceUnavailable { message: String },

    #[error("Malformed access token: {reason}")]
    MalformedToken { reason: String },

    #[error("Access token checksum mismatch: expected {expected:02}, found {found:02}")]
    ChecksumMismatch { expected: u8, found: u8 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any store is contacted.
    Validation,
    /// The caller can fix the request and try again.
    UserCorrectable,
    /// Transient; eligible for fallback or a bounded retry.
    Infrastructure,
    /// Decode-side failures that may indicate tampering.
    Integrity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BookingError {
    /// Stable, machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::InvalidDuration { .. } => "INVALID_DURATION",
            BookingError::InvalidGrace { .. } => "INVALID_GRACE",
            BookingError::InvalidField { .. } => "INVALID_FIELD",
            BookingError::InvalidConfig { .. } => "INVALID_CONFIG",
            BookingError::ConfigParse { .. } => "CONFIG_PARSE",
            BookingError::MissingInput { .. } => "MISSING_INPUT",
            BookingError::UnknownClass { .. } => "UNKNOWN_CLASS",
            BookingError::InvalidSlot { .. } => "INVALID_SLOT",
            BookingError::OverlappingReservation { .. } => "OVERLAPPING_RESERVATION",
            BookingError::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            BookingError::PersistenceUnavailable { .. } => "PERSISTENCE_UNAVAILABLE",
            BookingError::MalformedToken { .. } => "MALFORMED_TOKEN",
            BookingError::ChecksumMismatch { .. } => "CHECKSUM_MISMATCH",
            BookingError::IoError(_) => "IO_ERROR",
            BookingError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BookingError::InvalidDuration { .. }
            | BookingError::InvalidGrace { .. }
            | BookingError::InvalidField { .. }
            | BookingError::InvalidConfig { .. }
            | BookingError::ConfigParse { .. } => ErrorCategory::Validation,
            BookingError::MissingInput { .. }
            | BookingError::UnknownClass { .. }
            | BookingError::InvalidSlot { .. }
            | BookingError::OverlappingReservation { .. } => ErrorCategory::UserCorrectable,
            BookingError::StoreUnavailable { .. }
            | BookingError::PersistenceUnavailable { .. }
            | BookingError::IoError(_)
            | BookingError::SerializationError(_) => ErrorCategory::Infrastructure,
            BookingError::MalformedToken { .. } | BookingError::ChecksumMismatch { .. } => {
                ErrorCategory::Integrity
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::UserCorrectable => ErrorSeverity::Low,
            ErrorCategory::Infrastructure => ErrorSeverity::Medium,
            ErrorCategory::Validation => ErrorSeverity::High,
            ErrorCategory::Integrity => ErrorSeverity::Critical,
        }
    }

    /// Transient failures that a caller may retry or route to a fallback store.
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Infrastructure
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BookingError::InvalidDuration { .. } => "Use a class duration greater than zero minutes",
            BookingError::InvalidGrace { .. } => "Set grace_minutes to zero or a positive value",
            BookingError::InvalidField { .. } => {
                "Remove the '|' character from subject and class identifiers"
            }
            BookingError::InvalidConfig { .. } | BookingError::ConfigParse { .. } => {
                "Check the configuration file against the documented options"
            }
            BookingError::MissingInput { .. } => "Provide both a subject id and a class",
            BookingError::UnknownClass { .. } => "Run the `classes` command to list valid class ids",
            BookingError::InvalidSlot { .. } => "Run the `slots` command to list valid start times",
            BookingError::OverlappingReservation { .. } => {
                "Pick a start time that does not overlap your existing reservations"
            }
            BookingError::StoreUnavailable { .. } | BookingError::PersistenceUnavailable { .. } => {
                "Check connectivity to the reservation store or enable the fallback store"
            }
            BookingError::IoError(_) | BookingError::SerializationError(_) => {
                "Check that the fallback store directory is writable and not corrupted"
            }
            BookingError::MalformedToken { .. } | BookingError::ChecksumMismatch { .. } => {
                "Re-issue the access token from the original reservation"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BookingError::MissingInput { field } => format!("Please provide the {}", field),
            BookingError::OverlappingReservation { .. } => {
                "You already have a reservation at that time".to_string()
            }
            BookingError::StoreUnavailable { .. } | BookingError::PersistenceUnavailable { .. } => {
                "The reservation service is unavailable right now, please try again later"
                    .to_string()
            }
            BookingError::MalformedToken { .. } | BookingError::ChecksumMismatch { .. } => {
                "This access code is not valid".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_machine_readable() {
        let err = BookingError::OverlappingReservation {
            detail: "gim 07:00".to_string(),
        };
        assert_eq!(err.code(), "OVERLAPPING_RESERVATION");
        assert_eq!(err.category(), ErrorCategory::UserCorrectable);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_infrastructure_errors_are_transient() {
        let err = BookingError::StoreUnavailable {
            message: "timeout".to_string(),
        };
        assert!(err.is_transient());
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_checksum_mismatch_display_is_zero_padded() {
        let err = BookingError::ChecksumMismatch {
            expected: 7,
            found: 145,
        };
        assert_eq!(
            err.to_string(),
            "Access token checksum mismatch: expected 07, found 145"
        );
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
