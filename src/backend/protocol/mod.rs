//! Wire protocol spoken across the engine boundary
//!
//! Uses MessagePack for efficient binary serialization.

pub mod codec;
pub mod method;
pub mod request;
pub mod response;
pub mod value;

pub use codec::{decode_message, decode_reply, encode_message, Reply, MAX_MESSAGE_SIZE};
pub use method::Method;
pub use request::{
    BackendInit, ColumnNamesRequest, DbRequest, DbRequestKind, Empty, FlushRequest,
    OpenCollectionRequest, PageRequest, PageSizeRequest, TranslateRequest,
};
pub use response::{
    DbResponse, ErrorEnvelope, Int64, PackedResult, Progress, Row, StringList, StringValue,
};
pub use value::SqlValue;
