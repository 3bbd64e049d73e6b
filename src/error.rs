use core::fmt;

/// Errors reported by the runtime's boundary checks.
///
/// Every failure is reported directly to the immediate caller; nothing
/// propagates across thread boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    /// Lock id or condition index outside the configured table bounds.
    InvalidHandle,
    /// Joined a thread id that was never issued.
    UnknownThread,
    /// Waited on a lock that nobody holds.
    LockNotHeld,
}

impl RuntimeError {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeError::InvalidHandle => "lock id or condition index out of range",
            RuntimeError::UnknownThread => "thread id was never issued",
            RuntimeError::LockNotHeld => "waited on a lock that is not held",
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::error::Error for RuntimeError {}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
