//! Invalidation rule table.
//!
//! Maps each mutation category to the query keys that go stale when that
//! kind of write completes. This table is the only place that knows which
//! views depend on which writes; mutation sites consult it through
//! [`CacheInvalidator`](super::CacheInvalidator) instead of listing keys.

use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

use super::events::MutationCategory;
use super::keys::{HERO_ARTICLES, POSTS, PROFILES, QueryKey, REPORTS, STATS, USERS};

struct RuleTable {
    post: Vec<QueryKey>,
    user: Vec<QueryKey>,
    report: Vec<QueryKey>,
    known: Vec<QueryKey>,
}

static RULES: Lazy<RuleTable> = Lazy::new(|| {
    let post = roots(&[POSTS, HERO_ARTICLES, STATS]);
    let user = roots(&[USERS, PROFILES, STATS]);
    let report = roots(&[REPORTS, STATS]);

    let mut known: Vec<QueryKey> = Vec::new();
    for key in post.iter().chain(&user).chain(&report) {
        if !known.contains(key) {
            known.push(key.clone());
        }
    }

    RuleTable {
        post,
        user,
        report,
        known,
    }
});

fn roots(names: &[&str]) -> Vec<QueryKey> {
    names.iter().map(|name| QueryKey::root(*name)).collect()
}

/// A rule key with no refetchable query behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingTarget {
    pub category: MutationCategory,
    pub key: QueryKey,
}

impl fmt::Display for DanglingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.category, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invalidation rules target keys no view can refetch: {}", format_dangling(.0))]
    DanglingTargets(Vec<DanglingTarget>),
}

fn format_dangling(targets: &[DanglingTarget]) -> String {
    targets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read-only view over the static rule table.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvalidationPolicy;

impl InvalidationPolicy {
    /// Keys invalidated for `category`, in rule order.
    pub fn keys_for(category: MutationCategory) -> &'static [QueryKey] {
        match category {
            MutationCategory::PostMutation => &RULES.post,
            MutationCategory::UserMutation => &RULES.user,
            MutationCategory::ReportMutation => &RULES.report,
            MutationCategory::FullReset => &RULES.known,
        }
    }

    /// Every key any rule can invalidate, first-seen order, no duplicates.
    pub fn known_keys() -> &'static [QueryKey] {
        &RULES.known
    }

    pub fn rules() -> impl Iterator<Item = (MutationCategory, &'static [QueryKey])> {
        MutationCategory::ALL
            .into_iter()
            .map(|category| (category, Self::keys_for(category)))
    }

    /// Check that every rule key is covered by some refetchable key.
    ///
    /// A refetchable key covers a rule key when it is a prefix of it.
    pub fn validate_refetchable(refetchable: &[QueryKey]) -> Result<(), PolicyError> {
        let mut dangling = Vec::new();
        for (category, keys) in Self::rules() {
            for key in keys {
                if !refetchable.iter().any(|r| r.is_prefix_of(key)) {
                    dangling.push(DanglingTarget {
                        category,
                        key: key.clone(),
                    });
                }
            }
        }

        if dangling.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::DanglingTargets(dangling))
        }
    }
}
