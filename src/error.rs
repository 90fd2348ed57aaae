use thiserror::Error;

/// Errors raised by the decision engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fewer bars than an indicator's lookback requires
    #[error("insufficient data for {indicator}: need {required} bars, have {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    /// A position (or order history) query reported failure
    #[error("request failed: {0}")]
    Request(String),

    /// A balance query reported failure
    #[error("account error: {0}")]
    Account(String),

    /// Invalid inputs handed to the position sizer
    #[error("cannot size position: {0}")]
    Sizing(String),

    /// The state machine received an event its current state does not accept
    #[error("invariant violation: {event} is not valid while {state}")]
    InvariantViolation { state: String, event: &'static str },

    /// An exit order kept getting canceled past the configured ceiling
    #[error("exit order canceled {attempts} times, giving up")]
    ExitRetriesExhausted { attempts: u32 },

    /// Bar timestamps must strictly increase
    #[error("out-of-order bar: {current} does not follow {previous}")]
    OutOfOrderBar { previous: String, current: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// Bar feed could not be read or parsed
    #[error("bar feed error: {0}")]
    Feed(String),
}

impl EngineError {
    /// Recoverable errors skip the current cycle; everything else halts the run
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::InsufficientData { .. })
    }
}

impl From<::config::ConfigError> for EngineError {
    fn from(err: ::config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::Feed(err.to_string())
    }
}
