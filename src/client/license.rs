//! License gate consulted before any network I/O

use std::fmt;

/// Answers whether sessions may be opened
pub trait LicenseGate: Send + Sync + fmt::Debug {
    fn is_licensed(&self) -> bool;
}

/// License held as a plain string; empty means unlicensed
#[derive(Debug, Clone, Default)]
pub struct StaticLicense {
    key: String,
}

impl StaticLicense {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Always-licensed gate for tests and demos
    pub fn unrestricted() -> Self {
        Self::new("unrestricted")
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl LicenseGate for StaticLicense {
    fn is_licensed(&self) -> bool {
        !self.key.trim().is_empty()
    }
}
