/// What happened to one span of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanOutcome {
    Sent { sequence_id: u64 },
    /// Child span of a trace whose root was never seen; dropped.
    Orphan,
    /// Correlated, but the send failed. The sequence id stays consumed.
    SendFailed { sequence_id: u64, error: String },
    /// Creating the rollout for a new trace failed.
    CorrelationFailed { error: String },
}

impl SpanOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SpanOutcome::Sent { .. } => "sent",
            SpanOutcome::Orphan => "orphan",
            SpanOutcome::SendFailed { .. } => "send_failed",
            SpanOutcome::CorrelationFailed { .. } => "correlation_failed",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, SpanOutcome::Sent { .. } | SpanOutcome::Orphan)
    }
}

/// Per-span outcomes of one export call, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub outcomes: Vec<SpanOutcome>,
}

impl ExportReport {
    pub fn new(outcomes: Vec<SpanOutcome>) -> Self {
        Self { outcomes }
    }

    /// True when every span was sent or intentionally skipped.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(SpanOutcome::is_ok)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn sent(&self) -> usize {
        self.count(|o| matches!(o, SpanOutcome::Sent { .. }))
    }

    pub fn orphans(&self) -> usize {
        self.count(|o| matches!(o, SpanOutcome::Orphan))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| !o.is_ok())
    }

    fn count(&self, f: impl Fn(&SpanOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| f(o)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphans_do_not_fail_a_batch() {
        let report = ExportReport::new(vec![
            SpanOutcome::Orphan,
            SpanOutcome::Sent { sequence_id: 0 },
        ]);
        assert!(report.is_success());
        assert_eq!(report.orphans(), 1);
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn one_failure_fails_the_batch_but_keeps_counts() {
        let report = ExportReport::new(vec![
            SpanOutcome::Sent { sequence_id: 0 },
            SpanOutcome::SendFailed {
                sequence_id: 1,
                error: "503".into(),
            },
            SpanOutcome::Sent { sequence_id: 2 },
        ]);
        assert!(!report.is_success());
        assert_eq!(report.sent(), 2);
        assert_eq!(report.failed(), 1);
    }
}
