//! Confirmation seam for destructive reconciliation steps.

/// Asks the operator before a destructive step.
pub trait Prompt: Send + Sync {
    /// Ask a yes/no question. `default` is the answer on empty input.
    fn confirm(&self, message: &str, default: bool) -> bool;
}

/// Answers every question the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedAnswer(pub bool);

impl Prompt for FixedAnswer {
    fn confirm(&self, _message: &str, _default: bool) -> bool {
        self.0
    }
}

/// Wraps a prompt with an optional forced answer.
#[derive(Debug, Clone)]
pub struct Forced<P> {
    inner: P,
    answer: Option<bool>,
}

impl<P: Prompt> Forced<P> {
    /// Use `answer` when set, otherwise ask `inner`.
    pub fn new(inner: P, answer: Option<bool>) -> Self {
        Self { inner, answer }
    }
}

impl<P: Prompt> Prompt for Forced<P> {
    fn confirm(&self, message: &str, default: bool) -> bool {
        match self.answer {
            Some(answer) => answer,
            None => self.inner.confirm(message, default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TakeDefault;

    impl Prompt for TakeDefault {
        fn confirm(&self, _message: &str, default: bool) -> bool {
            default
        }
    }

    #[test]
    fn test_forced_answer_overrides() {
        assert!(Forced::new(FixedAnswer(false), Some(true)).confirm("drop?", false));
        assert!(!Forced::new(TakeDefault, Some(false)).confirm("drop?", true));
        assert!(Forced::new(TakeDefault, None).confirm("drop?", true));
    }
}
