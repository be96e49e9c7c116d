use thiserror::Error;

/// Failure reported by a unit executor for a single attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// Plausibly resolved by trying again (rate limits, network blips).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Retrying cannot help (invalid configuration, rejected plan).
    #[error("terminal failure: {0}")]
    Terminal(String),

    /// The executor observed cancellation and stopped.
    #[error("cancelled")]
    Cancelled,
}

impl UnitError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Message without the classification prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(msg) | Self::Terminal(msg) => msg,
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(UnitError::transient("429").is_transient());
        assert!(!UnitError::terminal("bad input").is_transient());
        assert!(!UnitError::Cancelled.is_transient());
        assert_eq!(UnitError::terminal("bad input").message(), "bad input");
    }
}
