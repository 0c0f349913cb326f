//! Mapping of engine error envelopes onto a closed set of error categories.
//!
//! The engine reports a numeric error kind plus a free-form message. Most
//! kinds map one-to-one onto a category; database errors are further split by
//! inspecting the message, and a few invalid-input messages are promoted to
//! their own categories.

use super::protocol::ErrorEnvelope;
use thiserror::Error;

/// Numeric error kinds as produced by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    InvalidInput = 0,
    TemplateParse = 1,
    DbError = 2,
    IoError = 3,
    NetworkError = 4,
    SyncAuthError = 5,
    SyncOtherError = 6,
    SyncServerMessage = 7,
    JsonError = 8,
    ProtoError = 9,
    Interrupted = 10,
    NotFound = 11,
    Exists = 12,
    FilteredDeckError = 13,
    SearchError = 14,
    Deleted = 15,
    OsError = 16,
    Panic = 17,
}

impl ErrorCode {
    const ALL: [ErrorCode; 18] = [
        ErrorCode::InvalidInput,
        ErrorCode::TemplateParse,
        ErrorCode::DbError,
        ErrorCode::IoError,
        ErrorCode::NetworkError,
        ErrorCode::SyncAuthError,
        ErrorCode::SyncOtherError,
        ErrorCode::SyncServerMessage,
        ErrorCode::JsonError,
        ErrorCode::ProtoError,
        ErrorCode::Interrupted,
        ErrorCode::NotFound,
        ErrorCode::Exists,
        ErrorCode::FilteredDeckError,
        ErrorCode::SearchError,
        ErrorCode::Deleted,
        ErrorCode::OsError,
        ErrorCode::Panic,
    ];

    pub fn from_i32(code: i32) -> Option<ErrorCode> {
        Self::ALL.into_iter().find(|c| *c as i32 == code)
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Client-side error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    InvalidInput,
    TemplateError,
    DbFileTooNew,
    DbFileTooOld,
    DbMissingEntity,
    DbLocked,
    DbCorrupt,
    DbOther,
    Io,
    Network,
    SyncAuthFailed,
    SyncOther,
    SyncServerMessage,
    Json,
    Proto,
    Interrupted,
    CollectionNotOpen,
    CollectionAlreadyOpen,
    NotFound,
    Existing,
    FilteredDeck,
    Search,
    Deleted,
    OsError,
    Unrecognized,
    /// The engine panicked. Latches the handle that saw it.
    Fatal,
}

impl ErrorCategory {
    pub fn is_database(self) -> bool {
        matches!(
            self,
            ErrorCategory::DbFileTooNew
                | ErrorCategory::DbFileTooOld
                | ErrorCategory::DbMissingEntity
                | ErrorCategory::DbLocked
                | ErrorCategory::DbCorrupt
                | ErrorCategory::DbOther
        )
    }

    pub fn is_sync(self) -> bool {
        matches!(
            self,
            ErrorCategory::SyncAuthFailed
                | ErrorCategory::SyncOther
                | ErrorCategory::SyncServerMessage
        )
    }

    /// Invalid input, including the two collection-state refinements
    pub fn is_invalid_input(self) -> bool {
        matches!(
            self,
            ErrorCategory::InvalidInput
                | ErrorCategory::CollectionNotOpen
                | ErrorCategory::CollectionAlreadyOpen
        )
    }

    pub fn is_fatal(self) -> bool {
        self == ErrorCategory::Fatal
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::TemplateError => "template_error",
            ErrorCategory::DbFileTooNew => "db_file_too_new",
            ErrorCategory::DbFileTooOld => "db_file_too_old",
            ErrorCategory::DbMissingEntity => "db_missing_entity",
            ErrorCategory::DbLocked => "db_locked",
            ErrorCategory::DbCorrupt => "db_corrupt",
            ErrorCategory::DbOther => "db_other",
            ErrorCategory::Io => "io",
            ErrorCategory::Network => "network",
            ErrorCategory::SyncAuthFailed => "sync_auth_failed",
            ErrorCategory::SyncOther => "sync_other",
            ErrorCategory::SyncServerMessage => "sync_server_message",
            ErrorCategory::Json => "json",
            ErrorCategory::Proto => "proto",
            ErrorCategory::Interrupted => "interrupted",
            ErrorCategory::CollectionNotOpen => "collection_not_open",
            ErrorCategory::CollectionAlreadyOpen => "collection_already_open",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Existing => "existing",
            ErrorCategory::FilteredDeck => "filtered_deck",
            ErrorCategory::Search => "search",
            ErrorCategory::Deleted => "deleted",
            ErrorCategory::OsError => "os_error",
            ErrorCategory::Unrecognized => "unrecognized",
            ErrorCategory::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

enum MessageMatch {
    Contains(&'static str),
    StartsWith(&'static str),
}

impl MessageMatch {
    fn matches(&self, message: &str) -> bool {
        match self {
            MessageMatch::Contains(needle) => message.contains(needle),
            MessageMatch::StartsWith(prefix) => message.starts_with(prefix),
        }
    }
}

/// Database sub-kind patterns, checked in order; first match wins.
///
/// The engine only exposes the database sub-kind inside its debug-formatted
/// message, so this table is a compatibility shim for that message shape.
const DB_KIND_PATTERNS: &[(MessageMatch, ErrorCategory)] = &[
    (MessageMatch::Contains("kind: FileTooNew"), ErrorCategory::DbFileTooNew),
    (MessageMatch::Contains("kind: FileTooOld"), ErrorCategory::DbFileTooOld),
    (MessageMatch::Contains("kind: MissingEntity"), ErrorCategory::DbMissingEntity),
    (MessageMatch::Contains("kind: Locked"), ErrorCategory::DbLocked),
    (MessageMatch::StartsWith("Collection already open"), ErrorCategory::DbLocked),
    (MessageMatch::Contains("kind: Corrupt"), ErrorCategory::DbCorrupt),
    (MessageMatch::Contains("DatabaseCorrupt"), ErrorCategory::DbCorrupt),
    (MessageMatch::Contains("kind: Other"), ErrorCategory::DbOther),
];

/// Exact invalid-input messages promoted to their own category
const INVALID_INPUT_MESSAGES: &[(&str, ErrorCategory)] = &[
    ("CollectionAlreadyOpen", ErrorCategory::CollectionAlreadyOpen),
    ("CollectionNotOpen", ErrorCategory::CollectionNotOpen),
];

fn classify_db_message(message: &str) -> ErrorCategory {
    DB_KIND_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.matches(message))
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::DbOther)
}

fn classify_invalid_input(message: &str) -> ErrorCategory {
    INVALID_INPUT_MESSAGES
        .iter()
        .find(|(exact, _)| *exact == message)
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::InvalidInput)
}

/// Classify an error envelope. Unknown codes map to `Unrecognized`.
pub fn classify(envelope: &ErrorEnvelope) -> ErrorCategory {
    let Some(code) = ErrorCode::from_i32(envelope.kind) else {
        return ErrorCategory::Unrecognized;
    };

    match code {
        ErrorCode::InvalidInput => classify_invalid_input(&envelope.message),
        ErrorCode::TemplateParse => ErrorCategory::TemplateError,
        ErrorCode::DbError => classify_db_message(&envelope.message),
        ErrorCode::IoError => ErrorCategory::Io,
        ErrorCode::NetworkError => ErrorCategory::Network,
        ErrorCode::SyncAuthError => ErrorCategory::SyncAuthFailed,
        ErrorCode::SyncOtherError => ErrorCategory::SyncOther,
        ErrorCode::SyncServerMessage => ErrorCategory::SyncServerMessage,
        ErrorCode::JsonError => ErrorCategory::Json,
        ErrorCode::ProtoError => ErrorCategory::Proto,
        ErrorCode::Interrupted => ErrorCategory::Interrupted,
        ErrorCode::NotFound => ErrorCategory::NotFound,
        ErrorCode::Exists => ErrorCategory::Existing,
        ErrorCode::FilteredDeckError => ErrorCategory::FilteredDeck,
        ErrorCode::SearchError => ErrorCategory::Search,
        ErrorCode::Deleted => ErrorCategory::Deleted,
        ErrorCode::OsError => ErrorCategory::OsError,
        ErrorCode::Panic => ErrorCategory::Fatal,
    }
}

/// A classified engine error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub category: ErrorCategory,
    /// Raw error kind from the envelope
    pub code: i32,
    pub message: String,
    pub help_page: Option<String>,
}

impl BackendError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            code: -1,
            message: message.into(),
            help_page: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Fatal, message)
    }

    pub fn is_fatal(&self) -> bool {
        self.category.is_fatal()
    }
}

impl From<ErrorEnvelope> for BackendError {
    fn from(envelope: ErrorEnvelope) -> Self {
        Self {
            category: classify(&envelope),
            code: envelope.kind,
            message: envelope.message,
            help_page: envelope.help_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(code: ErrorCode, message: &str) -> ErrorEnvelope {
        ErrorEnvelope {
            kind: code.as_i32(),
            message: message.to_string(),
            help_page: None,
        }
    }

    #[test]
    fn test_code_round_trip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(ErrorCode::from_i32(999), None);
    }

    #[test]
    fn test_category_groups() {
        assert!(ErrorCategory::SyncAuthFailed.is_sync());
        assert!(ErrorCategory::SyncServerMessage.is_sync());
        assert!(!ErrorCategory::Network.is_sync());
        assert!(ErrorCategory::DbLocked.is_database());
        assert!(!ErrorCategory::SyncOther.is_database());
        assert!(ErrorCategory::Fatal.is_fatal());
    }

    #[test]
    fn test_db_patterns() {
        let cases = [
            ("DbError { info: \"x\", kind: FileTooNew }", ErrorCategory::DbFileTooNew),
            ("DbError { info: \"x\", kind: FileTooOld }", ErrorCategory::DbFileTooOld),
            ("DbError { info: \"x\", kind: MissingEntity }", ErrorCategory::DbMissingEntity),
            ("DbError { info: \"x\", kind: Locked }", ErrorCategory::DbLocked),
            ("Collection already open in another process", ErrorCategory::DbLocked),
            ("DbError { info: \"x\", kind: Corrupt }", ErrorCategory::DbCorrupt),
            ("SqliteFailure(Error { code: DatabaseCorrupt })", ErrorCategory::DbCorrupt),
            ("DbError { info: \"x\", kind: Other }", ErrorCategory::DbOther),
            ("something else entirely", ErrorCategory::DbOther),
        ];
        for (message, expected) in cases {
            assert_eq!(
                classify(&envelope(ErrorCode::DbError, message)),
                expected,
                "message: {}",
                message
            );
        }
    }

    #[test]
    fn test_already_open_is_prefix_only() {
        let e = envelope(ErrorCode::DbError, "kind: Other; Collection already open");
        assert_eq!(classify(&e), ErrorCategory::DbOther);
    }

    #[test]
    fn test_invalid_input_refinement_is_exact() {
        assert_eq!(
            classify(&envelope(ErrorCode::InvalidInput, "CollectionNotOpen")),
            ErrorCategory::CollectionNotOpen
        );
        assert_eq!(
            classify(&envelope(ErrorCode::InvalidInput, "CollectionAlreadyOpen")),
            ErrorCategory::CollectionAlreadyOpen
        );
        assert_eq!(
            classify(&envelope(ErrorCode::InvalidInput, "CollectionNotOpen yet")),
            ErrorCategory::InvalidInput
        );
    }

    #[test]
    fn test_unknown_code_is_unrecognized() {
        let e = ErrorEnvelope {
            kind: 4242,
            message: "??".to_string(),
            help_page: None,
        };
        assert_eq!(classify(&e), ErrorCategory::Unrecognized);
    }

    #[test]
    fn test_panic_is_fatal() {
        let err = BackendError::from(envelope(ErrorCode::Panic, "boom"));
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "boom");
    }
}
