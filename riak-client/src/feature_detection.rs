//! Server version parsing and capability checks

use std::cmp::Ordering;

/// A `major.minor.patch` server version; trailing build tags are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        ServerVersion { major, minor, patch }
    }

    /// Parse strings like `1.4.2`, `1.4.2-0-g2bf1b39` or `2.0`.
    pub fn parse(version: &str) -> Option<Self> {
        let core = version.trim().split(['-', '+', ' ']).next()?;
        let mut numbers = core.split('.').map(|n| n.parse::<u32>());
        let major = numbers.next()?.ok()?;
        let minor = numbers.next().unwrap_or(Ok(0)).ok()?;
        let patch = numbers.next().unwrap_or(Ok(0)).ok()?;
        Some(ServerVersion::new(major, minor, patch))
    }
}

impl PartialOrd for ServerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl std::fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

const INDEX_PAGINATION: ServerVersion = ServerVersion::new(1, 4, 0);
const INDEX_RETURN_TERMS: ServerVersion = ServerVersion::new(1, 4, 0);

/// What the connected store supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    version: Option<ServerVersion>,
}

impl Capabilities {
    /// Capabilities of a known version; `None` means unknown, which assumes
    /// everything is supported.
    pub fn new(version: Option<ServerVersion>) -> Self {
        Capabilities { version }
    }

    pub fn version(&self) -> Option<ServerVersion> {
        self.version
    }

    pub fn index_pagination(&self) -> bool {
        self.at_least(INDEX_PAGINATION)
    }

    pub fn index_return_terms(&self) -> bool {
        self.at_least(INDEX_RETURN_TERMS)
    }

    fn at_least(&self, required: ServerVersion) -> bool {
        self.version.map_or(true, |version| version >= required)
    }
}
