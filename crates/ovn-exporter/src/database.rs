//! The two OVN databases the exporter watches.

use std::fmt;

/// One of the two replicated OVN databases.
///
/// Used as a label dimension on every per-database metric and as the key
/// for per-database failure tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Database {
    /// `OVN_Northbound`, the logical (CMS-facing) database.
    Northbound,
    /// `OVN_Southbound`, the physical/binding database.
    Southbound,
}

impl Database {
    /// Iteration order used by every per-database collector.
    pub const ALL: [Database; 2] = [Database::Northbound, Database::Southbound];

    /// Schema name as understood by `ovn-appctl` and the JSON-RPC server.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Database::Northbound => "OVN_Northbound",
            Database::Southbound => "OVN_Southbound",
        }
    }

    /// Application name reported in the `ovn_status` component label.
    #[must_use]
    pub const fn app_name(&self) -> &'static str {
        match self {
            Database::Northbound => "ovsdb-server-northbound",
            Database::Southbound => "ovsdb-server-southbound",
        }
    }

    /// Reverse of [`Database::app_name`].
    #[must_use]
    pub fn from_app_name(app: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|db| db.app_name() == app)
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
