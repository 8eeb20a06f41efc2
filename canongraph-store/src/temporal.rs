//! Version and timestamp tracking for knowledge records
//!
//! Every node carries a [`VersionStamp`]: when it was created, when it was
//! last mutated, and a version counter that moves by exactly one per
//! mutation. Writes are last-write-wins by version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation/modification timestamps plus a monotonic version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStamp {
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record was last mutated
    pub modified_at: DateTime<Utc>,
    /// Starts at 1, bumped on every mutation
    pub version: u64,
}

impl VersionStamp {
    /// Stamp for a record created now
    pub fn new_current() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            modified_at: now,
            version: 1,
        }
    }

    /// Stamp for a record created at a specific time
    pub fn created_at(time: DateTime<Utc>) -> Self {
        Self {
            created_at: time,
            modified_at: time,
            version: 1,
        }
    }

    /// Record a mutation: bump the version and refresh `modified_at`
    ///
    /// `modified_at` never moves backwards even if the wall clock does.
    pub fn touch(&mut self) {
        self.version += 1;
        let now = Utc::now();
        if now > self.modified_at {
            self.modified_at = now;
        }
    }

    /// Whether this stamp is newer than `other` under last-write-wins
    pub fn supersedes(&self, other: &VersionStamp) -> bool {
        self.version > other.version
    }

    /// Milliseconds since the epoch of the last modification
    pub fn modified_millis(&self) -> i64 {
        self.modified_at.timestamp_millis()
    }
}

impl Default for VersionStamp {
    fn default() -> Self {
        Self::new_current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_current_starts_at_version_one() {
        let stamp = VersionStamp::new_current();
        assert_eq!(stamp.version, 1);
        assert_eq!(stamp.created_at, stamp.modified_at);
    }

    #[test]
    fn test_touch_increments_by_one() {
        let mut stamp = VersionStamp::new_current();
        stamp.touch();
        assert_eq!(stamp.version, 2);
        stamp.touch();
        assert_eq!(stamp.version, 3);
        assert!(stamp.modified_at >= stamp.created_at);
    }

    #[test]
    fn test_touch_never_rewinds_modified_at() {
        let future = Utc::now() + Duration::hours(1);
        let mut stamp = VersionStamp::created_at(future);
        stamp.touch();
        assert_eq!(stamp.modified_at, future);
        assert_eq!(stamp.version, 2);
    }

    #[test]
    fn test_supersedes() {
        let older = VersionStamp::new_current();
        let mut newer = older.clone();
        newer.touch();
        assert!(newer.supersedes(&older));
        assert!(!older.supersedes(&newer));
    }
}
