use regex::Regex;
use stackrun_core::UnitError;

/// Messages that usually clear up on their own.
const TRANSIENT_PATTERNS: &[&str] = &[
    r"(?i)rate.?limit",
    r"(?i)too many requests",
    r"(?i)throttl",
    r"\b(429|502|503|504)\b",
    r"(?i)service unavailable",
    r"(?i)timed? ?out",
    r"(?i)connection (reset|refused|closed)",
    r"(?i)temporar(y|ily) (failure|unavailable)",
    r"(?i)(state )?lock (is )?(held|acquired|contention)",
    r"(?i)error acquiring the state lock",
];

/// Maps raw executor error text to a transient or terminal [`UnitError`].
///
/// Anything that does not match a transient pattern is terminal, so unknown
/// failures are never retried.
pub struct FailureClassifier {
    transient: Vec<Regex>,
}

impl FailureClassifier {
    pub fn new() -> Self {
        let transient = TRANSIENT_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self { transient }
    }

    /// Classifier with no built-in patterns.
    pub fn empty() -> Self {
        Self {
            transient: Vec::new(),
        }
    }

    /// Add a caller-specific transient pattern.
    pub fn with_pattern(mut self, pattern: &str) -> anyhow::Result<Self> {
        let regex = Regex::new(pattern)?;
        self.transient.push(regex);
        Ok(self)
    }

    pub fn is_transient(&self, message: &str) -> bool {
        self.transient.iter().any(|re| re.is_match(message))
    }

    pub fn classify(&self, message: impl Into<String>) -> UnitError {
        let message = message.into();
        if self.is_transient(&message) {
            UnitError::Transient(message)
        } else {
            UnitError::Terminal(message)
        }
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_transient_messages() {
        let classifier = FailureClassifier::new();
        for msg in [
            "Error: RequestLimitExceeded: Rate limit exceeded",
            "HTTP 429 Too Many Requests",
            "503 Service Unavailable",
            "dial tcp 10.0.0.1:443: i/o timeout",
            "read: connection reset by peer",
            "Error acquiring the state lock",
            "Throttling: request was throttled",
        ] {
            assert!(classifier.is_transient(msg), "expected transient: {msg}");
        }
    }

    #[test]
    fn test_unknown_messages_are_terminal() {
        let classifier = FailureClassifier::new();
        let err = classifier.classify("Error: Unsupported argument \"instance_typ\"");
        assert!(matches!(err, UnitError::Terminal(_)));
        assert!(!classifier.is_transient("port 4290 already allocated"));
    }

    #[test]
    fn test_custom_pattern() {
        let classifier = FailureClassifier::empty()
            .with_pattern(r"(?i)quota")
            .unwrap();
        assert!(matches!(
            classifier.classify("Quota exceeded for project"),
            UnitError::Transient(_)
        ));
        assert!(FailureClassifier::empty().with_pattern("(").is_err());
    }
}
