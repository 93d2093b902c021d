//! Host operating system identification.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The closed set of operating systems the library knows how to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OsKind {
    Linux,
    Windows,
    MacOs,
}

impl OsKind {
    /// Resolves the operating system identity for a session.
    ///
    /// An explicit `requested` value is returned verbatim without touching
    /// the host, which lets callers (and tests) pin the platform. Otherwise
    /// the host's platform identifier is probed and mapped onto the closed
    /// set.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedOs`] if the host reports a platform outside the
    /// closed set, [`Error::OsDetectionFailed`] if it reports none at all.
    pub fn resolve(requested: Option<OsKind>) -> Result<OsKind> {
        match requested {
            Some(os) => Ok(os),
            None => Self::detect(),
        }
    }

    /// Probes the platform identifier reported by the standard library.
    fn detect() -> Result<OsKind> {
        match std::env::consts::OS {
            "linux" => Ok(OsKind::Linux),
            "windows" => Ok(OsKind::Windows),
            "macos" => Ok(OsKind::MacOs),
            "" => Err(Error::OsDetectionFailed),
            other => Err(Error::UnsupportedOs {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OsKind::Linux => "Linux",
            OsKind::Windows => "Windows",
            OsKind::MacOs => "macOS",
        })
    }
}

impl FromStr for OsKind {
    type Err = Error;

    /// Accepts the conventional spellings plus `Darwin`, the kernel
    /// identifier Apple platforms report from `uname`.
    fn from_str(s: &str) -> Result<OsKind> {
        match s {
            "linux" | "Linux" => Ok(OsKind::Linux),
            "windows" | "Windows" => Ok(OsKind::Windows),
            "macos" | "macOS" | "darwin" | "Darwin" => Ok(OsKind::MacOs),
            other => Err(Error::UnsupportedOs {
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_skips_probing() {
        for os in [OsKind::Linux, OsKind::Windows, OsKind::MacOs] {
            assert_eq!(OsKind::resolve(Some(os)).unwrap(), os);
        }
    }

    #[test]
    fn host_platform_resolves() {
        // The test host is always one of the three supported platforms.
        assert!(OsKind::resolve(None).is_ok());
    }

    #[test]
    fn parses_conventional_spellings() {
        assert_eq!("linux".parse::<OsKind>().unwrap(), OsKind::Linux);
        assert_eq!("Windows".parse::<OsKind>().unwrap(), OsKind::Windows);
        assert_eq!("macOS".parse::<OsKind>().unwrap(), OsKind::MacOs);
        assert_eq!("Darwin".parse::<OsKind>().unwrap(), OsKind::MacOs);
        assert!(matches!(
            "beos".parse::<OsKind>(),
            Err(Error::UnsupportedOs { .. })
        ));
    }
}
