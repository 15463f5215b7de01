use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A social post submitted for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub content: String,
    /// ISO 8601 timestamp of publication.
    pub timestamp: String,
}

impl Post {
    pub fn new(
        id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            content: content.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Posts with ids starting with `test-` belong to the labelled test set.
    pub fn is_test(&self) -> bool {
        self.id.starts_with("test-")
    }
}

/// Ground-truth labels for one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expected {
    pub category: String,
    pub sentiment: String,
}

impl Expected {
    pub fn new(category: impl Into<String>, sentiment: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            sentiment: sentiment.into(),
        }
    }
}

/// Post id to expected labels.
pub type GroundTruth = BTreeMap<String, Expected>;

const TEST_POSTS: &[(&str, &str, &str, &str)] = &[
    (
        "test-tech-1",
        "techfounder",
        "Just launched our new TypeScript SDK for agent training! 🚀 It integrates with Mastra and supports OpenTelemetry. Check it out on GitHub.",
        "2024-01-15T10:30:00.000Z",
    ),
    (
        "test-startup-1",
        "startup_ceo",
        "Thrilled to announce we've raised $5M in Series A! Thank you to our amazing investors and team. Onwards and upwards! 🎉",
        "2024-01-15T14:20:00.000Z",
    ),
    (
        "test-pm-1",
        "pm_guru",
        "Hot take: Great product managers focus on the 'why' before the 'what'. Too many PMs jump straight to solutions. What do you think?",
        "2024-01-15T16:45:00.000Z",
    ),
    (
        "test-general-1",
        "random_user",
        "What should I have for lunch today? Thinking pizza vs sushi 🤔",
        "2024-01-15T12:30:00.000Z",
    ),
    (
        "test-tech-2",
        "devrel",
        "New blog: How we scaled our API from 1K to 1M requests per second using Rust and WebAssembly. Link in bio! ⚡",
        "2024-01-16T09:15:00.000Z",
    ),
    (
        "test-startup-2",
        "founder_life",
        "Month 6 of building in public. Revenue hit $10K MRR! Here's what we learned about customer acquisition...",
        "2024-01-16T11:00:00.000Z",
    ),
    (
        "test-pm-2",
        "product_insights",
        "Shipped our first AI feature today. Key learning: User feedback > Perfect implementation. Always talk to users early!",
        "2024-01-16T15:30:00.000Z",
    ),
    (
        "test-tech-3",
        "ml_engineer",
        "Experimenting with fine-tuning Gemini models. The results are incredible - 40% accuracy improvement on our task!",
        "2024-01-17T08:45:00.000Z",
    ),
];

const EXPECTED: &[(&str, &str, &str)] = &[
    ("test-tech-1", "technology", "positive"),
    ("test-startup-1", "startups", "positive"),
    ("test-pm-1", "product_management", "neutral"),
    ("test-general-1", "general", "neutral"),
    ("test-tech-2", "technology", "positive"),
    ("test-startup-2", "startups", "positive"),
    ("test-pm-2", "product_management", "positive"),
    ("test-tech-3", "technology", "positive"),
];

/// Built-in labelled dataset, one post per category at least.
pub fn test_posts() -> Vec<Post> {
    TEST_POSTS
        .iter()
        .map(|(id, author, content, ts)| Post::new(*id, *author, *content, *ts))
        .collect()
}

pub fn expected_classifications() -> GroundTruth {
    EXPECTED
        .iter()
        .map(|(id, category, sentiment)| (id.to_string(), Expected::new(*category, *sentiment)))
        .collect()
}

/// Parse a JSON array of posts.
pub fn parse_posts(raw: &str) -> Result<Vec<Post>, ToolError> {
    Ok(serde_json::from_str(raw)?)
}

/// Read a JSON array of posts from `path`.
pub fn load_posts(path: impl AsRef<Path>) -> Result<Vec<Post>, ToolError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ToolError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_posts(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_test_post_has_ground_truth() {
        let truth = expected_classifications();
        let posts = test_posts();
        assert_eq!(posts.len(), 8);
        for post in &posts {
            assert!(post.is_test());
            assert!(truth.contains_key(&post.id), "no label for {}", post.id);
        }
        assert_eq!(truth["test-pm-1"], Expected::new("product_management", "neutral"));
    }

    #[test]
    fn parses_posts_array() {
        let posts = parse_posts(
            r#"[{"id":"p1","author":"a","content":"hello","timestamp":"2024-01-01T00:00:00Z"}]"#,
        )
        .unwrap();
        assert_eq!(posts, vec![Post::new("p1", "a", "hello", "2024-01-01T00:00:00Z")]);
        assert!(!posts[0].is_test());
    }

    #[test]
    fn rejects_posts_missing_fields() {
        assert!(matches!(
            parse_posts(r#"[{"id":"p1"}]"#),
            Err(ToolError::InvalidPosts(_))
        ));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_posts("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
