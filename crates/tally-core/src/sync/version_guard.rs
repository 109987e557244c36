//! Optimistic concurrency check

/// Outcome of comparing a client's expected version with the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    Pass,
    Conflict {
        client_version: i64,
        server_version: i64,
    },
}

impl VersionCheck {
    pub const fn is_conflict(self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Strict-equality, server-wins version guard.
///
/// A write without an expected version is unconditional. A write whose
/// expected version differs from the stored one is rejected, never merged.
pub struct VersionGuard;

impl VersionGuard {
    pub const fn check(expected: Option<i64>, current: i64) -> VersionCheck {
        match expected {
            Some(client_version) if client_version != current => VersionCheck::Conflict {
                client_version,
                server_version: current,
            },
            _ => VersionCheck::Pass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_version_passes() {
        assert_eq!(VersionGuard::check(None, 7), VersionCheck::Pass);
    }

    #[test]
    fn test_equal_version_passes() {
        assert_eq!(VersionGuard::check(Some(3), 3), VersionCheck::Pass);
    }

    #[test]
    fn test_stale_and_future_versions_conflict() {
        assert_eq!(
            VersionGuard::check(Some(2), 3),
            VersionCheck::Conflict {
                client_version: 2,
                server_version: 3
            }
        );
        // A client claiming a newer version than the server does not win either
        assert!(VersionGuard::check(Some(4), 3).is_conflict());
    }
}
