//! Wire schema versions.
//!
//! Inter-node term replay is versioned. Every version below the latest
//! uses the nested self-describing message layout; the latest version
//! uses the streaming layout.

/// Schema version tag supplied by the caller of the binary decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaVersion {
    V1_14,
    V1_15,
    V1_16,
    V2_0,
    Latest,
}

impl SchemaVersion {
    /// Legacy versions decode through the nested-message layout
    pub fn is_legacy(self) -> bool {
        self != SchemaVersion::Latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_latest_is_streaming() {
        for version in [
            SchemaVersion::V1_14,
            SchemaVersion::V1_15,
            SchemaVersion::V1_16,
            SchemaVersion::V2_0,
        ] {
            assert!(version.is_legacy());
        }
        assert!(!SchemaVersion::Latest.is_legacy());
    }

    #[test]
    fn test_version_ordering() {
        assert!(SchemaVersion::V1_14 < SchemaVersion::V2_0);
        assert!(SchemaVersion::V2_0 < SchemaVersion::Latest);
    }
}
