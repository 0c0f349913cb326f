//! Error Taxonomy Tests
//!
//! Tests for:
//! - Classification of every engine error code
//! - Database sub-kinds recovered from messages
//! - Collection state errors from the SQLite engine
//! - SQL failures annotated with their statement

mod common;

use common::*;
use sqlbridge::backend::protocol::{encode_message, ErrorEnvelope, PackedResult};
use sqlbridge::backend::taxonomy::classify;
use sqlbridge::backend::ErrorCode;
use sqlbridge::{BridgeError, Database, ErrorCategory, SqlFailure, SqlValue};

fn envelope(kind: i32, message: &str) -> ErrorEnvelope {
    ErrorEnvelope {
        kind,
        message: message.to_string(),
        help_page: None,
    }
}

// ==================== Classification ====================

#[test]
fn test_classify_codes() {
    let cases = [
        (ErrorCode::InvalidInput, ErrorCategory::InvalidInput),
        (ErrorCode::TemplateParse, ErrorCategory::TemplateError),
        (ErrorCode::IoError, ErrorCategory::Io),
        (ErrorCode::NetworkError, ErrorCategory::Network),
        (ErrorCode::SyncAuthError, ErrorCategory::SyncAuthFailed),
        (ErrorCode::SyncOtherError, ErrorCategory::SyncOther),
        (ErrorCode::SyncServerMessage, ErrorCategory::SyncServerMessage),
        (ErrorCode::JsonError, ErrorCategory::Json),
        (ErrorCode::ProtoError, ErrorCategory::Proto),
        (ErrorCode::Interrupted, ErrorCategory::Interrupted),
        (ErrorCode::NotFound, ErrorCategory::NotFound),
        (ErrorCode::Exists, ErrorCategory::Existing),
        (ErrorCode::FilteredDeckError, ErrorCategory::FilteredDeck),
        (ErrorCode::SearchError, ErrorCategory::Search),
        (ErrorCode::Deleted, ErrorCategory::Deleted),
        (ErrorCode::OsError, ErrorCategory::OsError),
        (ErrorCode::Panic, ErrorCategory::Fatal),
    ];
    for (code, expected) in cases {
        assert_eq!(
            classify(&envelope(code.as_i32(), "something went wrong")),
            expected,
            "code {:?}",
            code
        );
    }
}

#[test]
fn test_classify_database_messages() {
    let cases = [
        ("DbError { info: \"\", kind: FileTooNew }", ErrorCategory::DbFileTooNew),
        ("DbError { info: \"\", kind: FileTooOld }", ErrorCategory::DbFileTooOld),
        ("DbError { info: \"\", kind: MissingEntity }", ErrorCategory::DbMissingEntity),
        ("DbError { info: \"\", kind: Locked }", ErrorCategory::DbLocked),
        ("Collection already open in another process", ErrorCategory::DbLocked),
        ("DbError { info: \"\", kind: Corrupt }", ErrorCategory::DbCorrupt),
        ("SqliteFailure(DatabaseCorrupt)", ErrorCategory::DbCorrupt),
        ("DbError { info: \"\", kind: Other }", ErrorCategory::DbOther),
        ("no recognizable kind", ErrorCategory::DbOther),
    ];
    for (message, expected) in cases {
        assert_eq!(
            classify(&envelope(ErrorCode::DbError.as_i32(), message)),
            expected,
            "message {:?}",
            message
        );
    }
}

#[test]
fn test_database_patterns_checked_in_order() {
    // a locked database whose info mentions corruption is still locked
    let message = "DbError { info: \"DatabaseCorrupt\", kind: Locked }";
    assert_eq!(
        classify(&envelope(ErrorCode::DbError.as_i32(), message)),
        ErrorCategory::DbLocked
    );
    // the prefix rule only applies at the start of the message
    let message = "error: Collection already open";
    assert_eq!(
        classify(&envelope(ErrorCode::DbError.as_i32(), message)),
        ErrorCategory::DbOther
    );
}

#[test]
fn test_classify_invalid_input_refinements() {
    let code = ErrorCode::InvalidInput.as_i32();
    assert_eq!(
        classify(&envelope(code, "CollectionNotOpen")),
        ErrorCategory::CollectionNotOpen
    );
    assert_eq!(
        classify(&envelope(code, "CollectionAlreadyOpen")),
        ErrorCategory::CollectionAlreadyOpen
    );
    // exact matches only
    assert_eq!(
        classify(&envelope(code, "CollectionNotOpen: call open first")),
        ErrorCategory::InvalidInput
    );
    assert!(ErrorCategory::CollectionNotOpen.is_invalid_input());
}

#[test]
fn test_classify_unknown_code() {
    assert_eq!(
        classify(&envelope(99, "from the future")),
        ErrorCategory::Unrecognized
    );
    assert_eq!(
        classify(&envelope(-1, "negative")),
        ErrorCategory::Unrecognized
    );
}

#[test]
fn test_unknown_code_through_backend() {
    let engine = ScriptedEngine::new(|_, _| {
        let envelope = ErrorEnvelope {
            kind: 42,
            message: "new failure kind".to_string(),
            help_page: Some("troubleshooting".to_string()),
        };
        Some(PackedResult::failure(encode_message(&envelope).unwrap()))
    });
    let backend = open_scripted(&engine);

    match backend.set_page_size(10).unwrap_err() {
        BridgeError::Backend(err) => {
            assert_eq!(err.category, ErrorCategory::Unrecognized);
            assert_eq!(err.code, 42);
            assert_eq!(err.message, "new failure kind");
            assert_eq!(err.help_page.as_deref(), Some("troubleshooting"));
        }
        other => panic!("expected backend error, got {:?}", other),
    }
    assert!(!backend.handle().is_poisoned());
}

// ==================== Collection State ====================

#[test]
fn test_collection_already_open() {
    let backend = open_memory_backend();
    let err = backend.open_collection(":memory:").unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::CollectionAlreadyOpen));
}

#[test]
fn test_collection_not_open() {
    let backend = open_memory_backend();
    backend.close_collection().unwrap();

    let err = backend.full_query("select 1", &[]).unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::CollectionNotOpen));

    // closing twice reports the same
    let err = backend.close_collection().unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::CollectionNotOpen));

    backend.open_collection(":memory:").unwrap();
    assert!(backend.full_query("select 1", &[]).is_ok());
}

// ==================== SQL Failures ====================

#[test]
fn test_unique_violation_is_constraint_failure() {
    let db = Database::new(open_memory_backend());
    seed_items(&db);
    let sql = "insert into items (name, qty) values (?, ?)";
    db.insert_for_id(sql, &["apple".into(), SqlValue::Long(1)]).unwrap();

    let err = db.insert_for_id(sql, &["apple".into(), SqlValue::Long(2)]).unwrap_err();
    match &err {
        BridgeError::Sql {
            query,
            failure,
            source,
        } => {
            assert_eq!(query, sql);
            assert_eq!(*failure, SqlFailure::Constraint);
            assert_eq!(source.category, ErrorCategory::DbOther);
        }
        other => panic!("expected sql error, got {:?}", other),
    }
    assert_eq!(err.category(), Some(ErrorCategory::DbOther));
    assert!(err.to_string().ends_with(&format!("(query: {})", sql)));
}

#[test]
fn test_wrong_argument_count() {
    let db = Database::new(open_memory_backend());
    let err = db
        .full_query("select ?, ?", &[SqlValue::Long(1)])
        .unwrap_err();

    match err {
        BridgeError::Sql { failure, .. } => {
            assert_eq!(
                failure,
                SqlFailure::BindIndexOutOfRange {
                    given: 1,
                    expected: 2
                }
            );
            assert_eq!(
                failure.to_string(),
                "Cannot bind argument at index 1 because the index is out of range.  \
                 The statement has 2 parameters."
            );
        }
        other => panic!("expected sql error, got {:?}", other),
    }
}

#[test]
fn test_syntax_error_is_other() {
    let db = Database::new(open_memory_backend());
    let err = db.exec_sql("selec 1", &[]).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Sql {
            failure: SqlFailure::Other,
            ..
        }
    ));
}

#[test]
fn test_non_database_errors_not_annotated() {
    let backend = open_memory_backend();
    backend.close_collection().unwrap();
    let db = Database::new(backend);

    let err = db.exec_sql("select 1", &[]).unwrap_err();
    assert!(matches!(err, BridgeError::Backend(_)));
    assert_eq!(err.category(), Some(ErrorCategory::CollectionNotOpen));
}
