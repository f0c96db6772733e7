use std::fmt;

use serde::Serialize;

/// Target operating system, named the way service tooling conventionally names it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Platform {
    Windows,
    Linux,
    Darwin,
    /// Any platform without a native service backend
    Other(String),
}

impl Platform {
    /// Platform of the running host
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS identifier (`std::env::consts::OS` or the `win32`/`darwin` aliases).
    pub fn from_os(os: &str) -> Self {
        match os.to_ascii_lowercase().as_str() {
            "windows" | "win32" => Self::Windows,
            "linux" => Self::Linux,
            "macos" | "darwin" => Self::Darwin,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => f.write_str("win32"),
            Self::Linux => f.write_str("linux"),
            Self::Darwin => f.write_str("darwin"),
            Self::Other(os) => f.write_str(os),
        }
    }
}

impl From<Platform> for String {
    fn from(p: Platform) -> Self {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve() {
        assert_eq!(Platform::from_os("macos"), Platform::Darwin);
        assert_eq!(Platform::from_os("darwin"), Platform::Darwin);
        assert_eq!(Platform::from_os("Win32"), Platform::Windows);
        assert_eq!(Platform::from_os("linux"), Platform::Linux);
    }

    #[test]
    fn unknown_os_is_unsupported() {
        let p = Platform::from_os("freebsd");
        assert_eq!(p, Platform::Other("freebsd".into()));
        assert!(!p.is_supported());
        assert_eq!(p.to_string(), "freebsd");
    }
}
