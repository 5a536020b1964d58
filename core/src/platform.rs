use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid platform `{0}`: expected <os>/<arch>, e.g. linux/amd64")]
pub struct PlatformParseError(pub String);

/// A Go `GOOS/GOARCH` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process runs on, in Go's naming.
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self::new(os, arch)
    }

    pub fn exe_suffix(&self) -> &'static str {
        if self.os == "windows" {
            ".exe"
        } else {
            ""
        }
    }

    /// Artifact name for a cross build, `<binary>-<os>-<arch>[.exe]`.
    pub fn artifact_name(&self, binary: &str) -> String {
        format!("{}-{}-{}{}", binary, self.os, self.arch, self.exe_suffix())
    }
}

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() && !arch.contains('/') => {
                Ok(Self::new(os, arch))
            }
            _ => Err(PlatformParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Platform {
    type Error = PlatformParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platform() {
        let platform: Platform = "linux/amd64".parse().unwrap();
        assert_eq!(platform, Platform::new("linux", "amd64"));
        assert_eq!(platform.to_string(), "linux/amd64");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("linux".parse::<Platform>().is_err());
        assert!("/amd64".parse::<Platform>().is_err());
        assert!("linux/".parse::<Platform>().is_err());
        assert!("linux/amd64/v2".parse::<Platform>().is_err());
    }

    #[test]
    fn test_artifact_name() {
        let windows = Platform::new("windows", "amd64");
        assert_eq!(windows.artifact_name("app"), "app-windows-amd64.exe");

        let darwin = Platform::new("darwin", "arm64");
        assert_eq!(darwin.artifact_name("app"), "app-darwin-arm64");
    }

    #[test]
    fn test_host_uses_go_names() {
        let host = Platform::host();
        assert_ne!(host.os, "macos");
        assert_ne!(host.arch, "x86_64");
    }
}
