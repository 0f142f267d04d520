//! Mutation categories.
//!
//! Write paths report what kind of data they changed; the category is the
//! lookup key into the invalidation rule table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of data-mutating action that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationCategory {
    /// An article was created, edited, published or removed.
    PostMutation,
    /// A user account or role changed.
    UserMutation,
    /// A moderation report was filed or resolved.
    ReportMutation,
    /// Everything must be considered stale.
    FullReset,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mutation category `{0}`")]
pub struct UnknownCategory(pub String);

impl MutationCategory {
    pub const ALL: [MutationCategory; 4] = [
        MutationCategory::PostMutation,
        MutationCategory::UserMutation,
        MutationCategory::ReportMutation,
        MutationCategory::FullReset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PostMutation => "post-mutation",
            Self::UserMutation => "user-mutation",
            Self::ReportMutation => "report-mutation",
            Self::FullReset => "full-reset",
        }
    }
}

impl fmt::Display for MutationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MutationCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == needle)
            .ok_or_else(|| UnknownCategory(needle.to_string()))
    }
}
