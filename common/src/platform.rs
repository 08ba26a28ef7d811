//! Build platform model.
//!
//! A [`Platform`] describes the native conventions of a wheel build target:
//! the `${OS}`/`${ARCH}` names used by Maven classifiers and archive
//! layouts, library file naming, and the wheel platform tag.

use std::fmt;

use thiserror::Error;

/// Placeholder replaced with [`Platform::os`].
pub const OS_PLACEHOLDER: &str = "${OS}";

/// Placeholder replaced with [`Platform::arch`].
pub const ARCH_PLACEHOLDER: &str = "${ARCH}";

/// Errors arising from platform selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The requested platform name is not in [`PLATFORMS`].
    #[error("unknown platform \"{name}\"; expected one of: {expected}")]
    Unknown {
        /// The rejected platform name.
        name: String,
        /// Comma-separated list of accepted names.
        expected: String,
    },

    /// The host operating system or architecture has no matching platform.
    #[error("unsupported host platform {os}/{arch}")]
    UnsupportedHost {
        /// Host operating system as reported by the standard library.
        os: String,
        /// Host architecture as reported by the standard library.
        arch: String,
    },
}

/// Native conventions for a supported build platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    name: &'static str,
    os: &'static str,
    arch: &'static str,
    libprefix: &'static str,
    libext: &'static str,
    linkext: Option<&'static str>,
    staticext: &'static str,
    tag: &'static str,
    system: &'static str,
    machine: &'static str,
}

/// Every platform the hook knows how to build for.
pub const PLATFORMS: &[Platform] = &[
    Platform {
        name: "linux-x86_64",
        os: "linux",
        arch: "x86-64",
        libprefix: "lib",
        libext: ".so",
        linkext: None,
        staticext: ".a",
        tag: "linux_x86_64",
        system: "Linux",
        machine: "x86_64",
    },
    Platform {
        name: "linux-aarch64",
        os: "linux",
        arch: "arm64",
        libprefix: "lib",
        libext: ".so",
        linkext: None,
        staticext: ".a",
        tag: "linux_aarch64",
        system: "Linux",
        machine: "aarch64",
    },
    Platform {
        name: "linux-roborio",
        os: "linux",
        arch: "athena",
        libprefix: "lib",
        libext: ".so",
        linkext: None,
        staticext: ".a",
        tag: "linux_roborio",
        system: "Linux",
        machine: "roborio",
    },
    Platform {
        name: "linux-raspbian",
        os: "linux",
        arch: "arm32",
        libprefix: "lib",
        libext: ".so",
        linkext: None,
        staticext: ".a",
        tag: "linux_armv7l",
        system: "Linux",
        machine: "armv7l",
    },
    Platform {
        name: "win-amd64",
        os: "windows",
        arch: "x86-64",
        libprefix: "",
        libext: ".dll",
        linkext: Some(".lib"),
        staticext: ".lib",
        tag: "win_amd64",
        system: "Windows",
        machine: "AMD64",
    },
    Platform {
        name: "macos-universal",
        os: "osx",
        arch: "universal",
        libprefix: "lib",
        libext: ".dylib",
        linkext: None,
        staticext: ".a",
        tag: "macosx_11_0_universal2",
        system: "Darwin",
        machine: "arm64",
    },
];

impl Platform {
    /// Look up a platform by name.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unknown`] when `name` is not listed in
    /// [`PLATFORMS`].
    ///
    /// # Examples
    ///
    /// ```
    /// use robotpy_fetch_common::platform::Platform;
    ///
    /// let platform = Platform::by_name("linux-roborio").unwrap();
    /// assert_eq!(platform.arch(), "athena");
    /// ```
    pub fn by_name(name: &str) -> Result<&'static Self, PlatformError> {
        PLATFORMS
            .iter()
            .find(|platform| platform.name == name)
            .ok_or_else(|| PlatformError::Unknown {
                name: name.to_owned(),
                expected: PLATFORMS
                    .iter()
                    .map(|platform| platform.name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Detect the platform of the running host.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnsupportedHost`] when the host has no
    /// matching entry.
    pub fn current() -> Result<&'static Self, PlatformError> {
        Self::for_host(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map a standard library OS/architecture pair onto a platform.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnsupportedHost`] for unmapped pairs.
    pub fn for_host(os: &str, arch: &str) -> Result<&'static Self, PlatformError> {
        let name = match (os, arch) {
            ("linux", "x86_64") => "linux-x86_64",
            ("linux", "aarch64") => "linux-aarch64",
            ("linux", "arm") => "linux-raspbian",
            ("windows", "x86_64") => "win-amd64",
            ("macos", _) => "macos-universal",
            _ => {
                return Err(PlatformError::UnsupportedHost {
                    os: os.to_owned(),
                    arch: arch.to_owned(),
                });
            }
        };
        log::debug!("host {os}/{arch} maps to platform {name}");
        Self::by_name(name)
    }

    /// Platform name, e.g. `linux-x86_64`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Operating system component substituted for `${OS}`.
    #[must_use]
    pub const fn os(&self) -> &'static str {
        self.os
    }

    /// Architecture component substituted for `${ARCH}`.
    #[must_use]
    pub const fn arch(&self) -> &'static str {
        self.arch
    }

    /// Wheel platform tag, e.g. `linux_x86_64`.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        self.tag
    }

    /// Whether shared libraries on this platform can be stripped with `strip`.
    #[must_use]
    pub fn is_linux(&self) -> bool {
        self.os == "linux"
    }

    /// `platform_system` as reported by Python on this platform.
    #[must_use]
    pub const fn system(&self) -> &'static str {
        self.system
    }

    /// `platform_machine` as reported by Python on this platform.
    #[must_use]
    pub const fn machine(&self) -> &'static str {
        self.machine
    }

    /// File name of the shared library `name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use robotpy_fetch_common::platform::Platform;
    ///
    /// let linux = Platform::by_name("linux-x86_64").unwrap();
    /// assert_eq!(linux.shared_library("wpiutil"), "libwpiutil.so");
    ///
    /// let windows = Platform::by_name("win-amd64").unwrap();
    /// assert_eq!(windows.shared_library("wpiutil"), "wpiutil.dll");
    /// ```
    #[must_use]
    pub fn shared_library(&self, name: &str) -> String {
        format!("{}{name}{}", self.libprefix, self.libext)
    }

    /// File name of the import library for `name`, where the platform has one.
    #[must_use]
    pub fn link_library(&self, name: &str) -> Option<String> {
        self.linkext
            .map(|ext| format!("{}{name}{ext}", self.libprefix))
    }

    /// File name of the static library `name`.
    #[must_use]
    pub fn static_library(&self, name: &str) -> String {
        format!("{}{name}{}", self.libprefix, self.staticext)
    }

    /// Replace `${OS}` and `${ARCH}` in `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use robotpy_fetch_common::platform::Platform;
    ///
    /// let platform = Platform::by_name("linux-roborio").unwrap();
    /// assert_eq!(platform.substitute("${OS}${ARCH}"), "linuxathena");
    /// ```
    #[must_use]
    pub fn substitute(&self, value: &str) -> String {
        value
            .replace(ARCH_PLACEHOLDER, self.arch)
            .replace(OS_PLACEHOLDER, self.os)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
