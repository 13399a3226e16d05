//! Running client version

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppVersion {
    pub name: String,
    /// Monotonic build number compared against published updates
    pub code: u32,
}

impl AppVersion {
    /// Version of this build
    pub fn current() -> Result<Self> {
        Self::parse(env!("CARGO_PKG_VERSION"))
    }

    /// Parse `major.minor.patch[-pre]`; the code is `major*10000 + minor*100 + patch`
    pub fn parse(version: &str) -> Result<Self> {
        let core = version.split(['-', '+']).next().unwrap_or_default();
        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(CoreError::Version(version.to_string()));
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| CoreError::Version(version.to_string()))?;
        }

        let [major, minor, patch] = numbers;
        if minor > 99 || patch > 99 {
            return Err(CoreError::Version(version.to_string()));
        }

        let code = major
            .checked_mul(10_000)
            .and_then(|c| c.checked_add(minor * 100 + patch))
            .ok_or_else(|| CoreError::Version(version.to_string()))?;

        Ok(Self {
            name: version.to_string(),
            code,
        })
    }

    pub fn label(&self) -> String {
        format!("{}  『 {} 』", self.name, self.code)
    }
}
