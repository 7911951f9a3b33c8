use crate::model::Conflict;

#[derive(Debug)]
pub enum EngineError {
    /// No such row, or a row outside the caller's scope. The two are
    /// deliberately one variant.
    NotFound(&'static str),
    /// The requested stay collides with confirmed bookings or blocked dates.
    Conflict(Vec<Conflict>),
    EmailTaken,
    InvalidResetToken,
    ExpiredResetToken,
    /// Attempted transition out of a terminal booking status.
    Terminal,
    /// Delete refused while confirmed bookings still reference the row.
    InUse(&'static str),
    Invalid(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(what) => write!(f, "{what} not found"),
            EngineError::Conflict(conflicts) => {
                write!(f, "unavailable: {} conflicting interval(s)", conflicts.len())
            }
            EngineError::EmailTaken => write!(f, "email already registered"),
            EngineError::InvalidResetToken => write!(f, "invalid or expired reset token"),
            EngineError::ExpiredResetToken => write!(f, "reset token has expired"),
            EngineError::Terminal => write!(f, "booking is cancelled"),
            EngineError::InUse(what) => write!(f, "{what} still has confirmed bookings"),
            EngineError::Invalid(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
