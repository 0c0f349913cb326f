//! Engine transactions and nested session bookkeeping

pub mod guard;
pub mod session;

pub use guard::TransactionGuard;
pub use session::{Session, SessionFrame};
