use opentelemetry::trace::SpanId;
use opentelemetry_sdk::trace::SpanData;

/// Decides whether a span starts a traced execution.
///
/// Only root spans may create a rollout for an unseen trace.
pub trait RootSpanPredicate: Send + Sync + 'static {
    fn is_root(&self, span: &SpanData) -> bool;
}

impl<F> RootSpanPredicate for F
where
    F: Fn(&SpanData) -> bool + Send + Sync + 'static,
{
    fn is_root(&self, span: &SpanData) -> bool {
        self(span)
    }
}

pub fn is_child(span: &SpanData) -> bool {
    span.parent_span_id != SpanId::INVALID
}

/// A span is a root when it has no parent or its name contains one of the
/// markers (case-insensitive).
#[derive(Debug, Clone)]
pub struct NameHeuristic {
    markers: Vec<String>,
}

impl Default for NameHeuristic {
    fn default() -> Self {
        Self::new(["agent", "generate", "mastra"])
    }
}

impl NameHeuristic {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

impl RootSpanPredicate for NameHeuristic {
    fn is_root(&self, span: &SpanData) -> bool {
        if !is_child(span) {
            return true;
        }
        let name = span.name.to_lowercase();
        self.markers.iter().any(|m| name.contains(m.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::trace_of;

    #[test]
    fn parentless_span_is_root() {
        let spans = trace_of("http.request", vec![], &[]);
        assert!(!is_child(&spans[0]));
        assert!(NameHeuristic::default().is_root(&spans[0]));
    }

    #[test]
    fn child_with_marker_is_root() {
        let heuristic = NameHeuristic::default();
        let spans = trace_of("http.request", vec![], &["PostAnalyzer.Agent.run", "llm.chat"]);
        let (agent, llm) = (&spans[1], &spans[2]);
        assert!(is_child(agent));
        assert!(heuristic.is_root(agent));
        assert!(!heuristic.is_root(llm));
    }

    #[test]
    fn custom_markers_and_closures() {
        let heuristic = NameHeuristic::new(["workflow"]);
        let spans = trace_of("request", vec![], &["agent.generate"]);
        assert!(!heuristic.is_root(&spans[1]));

        let only_parentless = |s: &SpanData| !is_child(s);
        assert!(!only_parentless.is_root(&spans[1]));
        assert!(only_parentless.is_root(&spans[0]));
    }
}
