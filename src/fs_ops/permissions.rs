//! POSIX-style permission sets.
//! Parsed from symbolic (`rwxr-x---`) or octal (`750`, `0750`) notation and
//! applied through the platform layer.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::errors::StoreError;

const SYMBOLS: [u8; 3] = [b'r', b'w', b'x'];

/// Mode bits (lower nine bits only) to apply to a file or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionSet(u32);

impl PermissionSet {
    pub fn from_mode(mode: u32) -> Self {
        Self(mode & 0o777)
    }

    pub fn mode(&self) -> u32 {
        self.0
    }

    /// An empty set means "nothing requested"; callers skip the chmod.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Parse symbolic or octal notation.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let s = s.trim();
        let invalid = || StoreError::InvalidPermissions(s.to_string());

        if !s.is_empty() && s.len() <= 4 && s.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            let mode = u32::from_str_radix(s, 8).map_err(|_| invalid())?;
            // setuid, setgid and sticky bits are not representable here.
            if mode > 0o777 {
                return Err(invalid());
            }
            return Ok(Self(mode));
        }

        let bytes = s.as_bytes();
        if bytes.len() != 9 {
            return Err(invalid());
        }
        let mut mode = 0u32;
        for (i, b) in bytes.iter().enumerate() {
            let bit = 1u32 << (8 - i);
            match *b {
                b'-' => {}
                c if c == SYMBOLS[i % 3] => mode |= bit,
                _ => return Err(invalid()),
            }
        }
        Ok(Self(mode))
    }

    /// Apply to `path`, returning the raw io::Error for the caller to classify.
    pub fn apply(&self, path: &Path) -> std::io::Result<()> {
        crate::platform::apply_mode(path, self.0)
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..9 {
            let bit = 1u32 << (8 - i);
            let c = if self.0 & bit != 0 { SYMBOLS[i % 3] } else { b'-' };
            write!(f, "{}", c as char)?;
        }
        Ok(())
    }
}

impl FromStr for PermissionSet {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
