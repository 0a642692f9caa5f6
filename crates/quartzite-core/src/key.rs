//! Identity for jobs and triggers.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The group every key belongs to unless one is given explicitly.
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Uniquely names a job or a trigger within its own namespace.
///
/// Jobs and triggers each have their own key space — a `Key` by itself
/// doesn't say which; callers keep that straight by storing `Key<JobDetail>`
/// values in the job maps and `Key<Trigger>` values in the trigger maps. The
/// wire/debug representation is always `group.name`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub name: String,
    pub group: String,
}

impl Key {
    /// A key in the default group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: DEFAULT_GROUP.to_owned(),
        }
    }

    /// A key in an explicit group.
    pub fn with_group(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// `(group, name)` ordering: group first so keys naturally cluster by group
/// when sorted, then name — used as the final tie-break in the trigger
/// acquisition order (spec §4.1).
impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.group
            .cmp(&other.group)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
