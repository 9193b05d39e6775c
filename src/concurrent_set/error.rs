use thiserror::Error;

/// Boundary-validation failures. Both variants indicate a programmer error
/// at the call site, not a runtime condition of the table itself.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SetError {
    #[error("thread id {tid} is out of range for a set constructed with {num_threads} threads")]
    InvalidThreadId { tid: usize, num_threads: usize },

    #[error("key {key:#x} is out of the legal range [1, 0x7FFFFFFE]")]
    KeyOutOfRange { key: i32 },
}
