use super::protocol::PackedResult;

/// Opaque token identifying one engine instance. Zero means "no instance".
pub type RawHandle = i64;

pub const CLOSED_HANDLE: RawHandle = 0;

/// The foreign engine boundary.
///
/// Every call exchanges encoded bytes. A call returns `None` when the engine
/// produced nothing at all, which the client treats as a protocol violation.
/// Implementations must tolerate calls with a handle that was already closed,
/// since exempt methods may race with `close`.
pub trait Engine: Send + Sync {
    /// One-time process setup, such as loading a native library.
    fn setup(&self) -> Result<(), String> {
        Ok(())
    }

    /// Create an instance from an encoded `BackendInit`. Success carries an
    /// encoded `Int64` with the new handle.
    fn open(&self, init: &[u8]) -> Option<PackedResult>;

    fn close(&self, handle: RawHandle);

    fn run_method(
        &self,
        handle: RawHandle,
        service: u32,
        method: u32,
        input: &[u8],
    ) -> Option<PackedResult>;
}
