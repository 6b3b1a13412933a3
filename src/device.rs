// Device identifier validation.
//
// Identifiers arrive from the selection step as bare kernel names ("sda",
// "nvme0n1") or as /dev paths. They end up in two places that must never
// see a hostile token: the argument vector of an external tool and the
// committed log file name. Validation happens once, at construction; the
// rest of the crate treats a DeviceId as opaque.

use crate::{SweepError, SweepResult};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A validated block-device name, stored without the `/dev/` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// Parse an operator-supplied token. Accepts `sda` and `/dev/sda`
    /// forms; everything else that could escape a single argv slot or a
    /// log file name is rejected.
    pub fn parse(token: &str) -> SweepResult<Self> {
        let invalid = |reason: &'static str| SweepError::InvalidDevice {
            token: token.to_string(),
            reason,
        };

        let name = token.strip_prefix("/dev/").unwrap_or(token);

        if name.is_empty() {
            return Err(invalid("empty device name"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }
        if name.starts_with('-') {
            return Err(invalid("leading dash would be read as a flag"));
        }
        if name == "." || name == ".." {
            return Err(invalid("not a device name"));
        }
        // Covers '/', shell metacharacters and control bytes alike.
        if name
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(invalid("contains characters not allowed in a device name"));
        }

        Ok(Self(name.to_string()))
    }

    /// Bare kernel name, e.g. `sda`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full path handed to external tools, e.g. `/dev/sda`.
    pub fn device_path(&self) -> PathBuf {
        PathBuf::from(format!("/dev/{}", self.0))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
