use serde::{Deserialize, Serialize};

use crate::{Rollout, RolloutStatus};

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Filters and pagination for `query_rollouts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_in: Option<Vec<RolloutStatus>>,
    pub limit: usize,
    pub offset: usize,
}

impl RolloutQuery {
    pub fn new() -> Self {
        Self {
            status_in: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: RolloutStatus) -> Self {
        self.status_in.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_LIMIT);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for RolloutQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// One page of `query_rollouts` results.
///
/// The server answers either with a bare array or with `{rollouts, total}`;
/// both shapes deserialize into this type. For the bare array `total` is the
/// array length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolloutPage {
    pub items: Vec<Rollout>,
    pub total: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageWire {
    List(Vec<Rollout>),
    Paged {
        #[serde(default)]
        rollouts: Vec<Rollout>,
        #[serde(default)]
        total: Option<usize>,
    },
}

impl<'de> Deserialize<'de> for RolloutPage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match PageWire::deserialize(deserializer)? {
            PageWire::List(items) => RolloutPage {
                total: items.len(),
                items,
            },
            PageWire::Paged { rollouts, total } => RolloutPage {
                total: total.unwrap_or(rollouts.len()),
                items: rollouts,
            },
        })
    }
}

impl RolloutPage {
    pub fn with_status(&self, status: RolloutStatus) -> impl Iterator<Item = &Rollout> {
        self.items.iter().filter(move |r| r.status == status)
    }
}
