/// Read-only lookup contracts to the rest of the platform.
pub mod directory;
/// Session aggregate storage and the atomic-mutate primitive.
pub mod session_store;
/// Storage abstraction layer shared by all backends.
pub mod storage;
