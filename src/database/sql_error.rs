use crate::error::BridgeError;
use once_cell::sync::Lazy;
use regex::Regex;

static PARAMETER_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"InvalidParameterCount\((\d*), (\d*)\)").expect("valid parameter count regex")
});

/// SQLite-level reason for a failed statement, recovered from the engine's
/// error message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlFailure {
    /// Number of bound arguments does not match the statement
    BindIndexOutOfRange { given: usize, expected: usize },
    Constraint,
    DiskFull,
    Corrupt,
    Other,
}

impl SqlFailure {
    pub fn from_message(message: &str) -> Self {
        if let Some(caps) = PARAMETER_COUNT.captures(message) {
            let given = caps[1].parse().unwrap_or(0);
            let expected = caps[2].parse().unwrap_or(0);
            return SqlFailure::BindIndexOutOfRange { given, expected };
        }
        if message.contains("ConstraintViolation") {
            SqlFailure::Constraint
        } else if message.contains("DiskFull") {
            SqlFailure::DiskFull
        } else if message.contains("DatabaseCorrupt") {
            SqlFailure::Corrupt
        } else {
            SqlFailure::Other
        }
    }
}

impl std::fmt::Display for SqlFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlFailure::BindIndexOutOfRange { given, expected } => write!(
                f,
                "Cannot bind argument at index {} because the index is out of range.  The statement has {} parameters.",
                given, expected
            ),
            SqlFailure::Constraint => write!(f, "constraint failed"),
            SqlFailure::DiskFull => write!(f, "database or disk is full"),
            SqlFailure::Corrupt => write!(f, "database disk image is malformed"),
            SqlFailure::Other => write!(f, "SQL error"),
        }
    }
}

/// Attach the failing statement to database errors. Everything else passes
/// through untouched.
pub(crate) fn annotate(query: &str, err: BridgeError) -> BridgeError {
    match err {
        BridgeError::Backend(source) if source.category.is_database() => BridgeError::Sql {
            query: query.to_string(),
            failure: SqlFailure::from_message(&source.message),
            source,
        },
        other => other,
    }
}
