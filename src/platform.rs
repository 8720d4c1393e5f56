//! Host platform in the identifiers the Go release index uses (`GOOS`/`GOARCH`).

use std::fmt;

use smol_str::SmolStr;

pub mod os {
    pub const WINDOWS: &str = "windows";
    pub const LINUX: &str = "linux";
    pub const DARWIN: &str = "darwin";
    pub const FREEBSD: &str = "freebsd";
    pub const NETBSD: &str = "netbsd";
    pub const OPENBSD: &str = "openbsd";
    pub const DRAGONFLY: &str = "dragonfly";
    pub const ILLUMOS: &str = "illumos";
    pub const SOLARIS: &str = "solaris";
    pub const AIX: &str = "aix";
}

pub mod arch {
    pub const I386: &str = "386";
    pub const AMD64: &str = "amd64";
    pub const ARM: &str = "arm";
    pub const ARMV6L: &str = "armv6l";
    pub const ARM64: &str = "arm64";
    pub const LOONG64: &str = "loong64";
    pub const MIPS: &str = "mips";
    pub const MIPSLE: &str = "mipsle";
    pub const MIPS64: &str = "mips64";
    pub const MIPS64LE: &str = "mips64le";
    pub const PPC64: &str = "ppc64";
    pub const PPC64LE: &str = "ppc64le";
    pub const RISCV64: &str = "riscv64";
    pub const S390X: &str = "s390x";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: SmolStr,
    pub arch: SmolStr,
}

impl Platform {
    pub fn new(os: impl Into<SmolStr>, arch: impl Into<SmolStr>) -> Self {
        Platform {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for, if Go ships for it.
    pub fn current() -> Option<Self> {
        Some(Platform::new(current_os()?, current_arch()?))
    }

    /// Combines explicit overrides with the detected host platform.
    pub fn resolve(os: Option<&str>, arch: Option<&str>) -> anyhow::Result<Self> {
        let os = match os {
            Some(os) => os,
            None => current_os().ok_or_else(|| {
                anyhow::anyhow!("Unable to detect the operating system, pass --os")
            })?,
        };
        let arch = match arch {
            Some(arch) => arch,
            None => current_arch().ok_or_else(|| {
                anyhow::anyhow!("Unable to detect the CPU architecture, pass --arch")
            })?,
        };
        Ok(Platform::new(os, arch))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

#[allow(unreachable_code)]
pub fn current_os() -> Option<&'static str> {
    #[cfg(target_os = "windows")]
    return Some(os::WINDOWS);

    #[cfg(target_os = "linux")]
    return Some(os::LINUX);

    #[cfg(target_os = "macos")]
    return Some(os::DARWIN);

    #[cfg(target_os = "freebsd")]
    return Some(os::FREEBSD);

    #[cfg(target_os = "netbsd")]
    return Some(os::NETBSD);

    #[cfg(target_os = "openbsd")]
    return Some(os::OPENBSD);

    #[cfg(target_os = "dragonfly")]
    return Some(os::DRAGONFLY);

    #[cfg(target_os = "illumos")]
    return Some(os::ILLUMOS);

    #[cfg(target_os = "solaris")]
    return Some(os::SOLARIS);

    #[cfg(target_os = "aix")]
    return Some(os::AIX);

    None
}

#[allow(unreachable_code)]
pub fn current_arch() -> Option<&'static str> {
    #[cfg(target_arch = "x86")]
    return Some(arch::I386);

    #[cfg(target_arch = "x86_64")]
    return Some(arch::AMD64);

    // Go only publishes armv6l binaries for 32-bit ARM.
    #[cfg(all(target_arch = "arm", target_os = "linux"))]
    return Some(arch::ARMV6L);

    #[cfg(all(target_arch = "arm", not(target_os = "linux")))]
    return Some(arch::ARM);

    #[cfg(target_arch = "aarch64")]
    return Some(arch::ARM64);

    #[cfg(target_arch = "loongarch64")]
    return Some(arch::LOONG64);

    #[cfg(all(target_arch = "mips", target_endian = "big"))]
    return Some(arch::MIPS);

    #[cfg(all(target_arch = "mips", target_endian = "little"))]
    return Some(arch::MIPSLE);

    #[cfg(all(target_arch = "mips64", target_endian = "big"))]
    return Some(arch::MIPS64);

    #[cfg(all(target_arch = "mips64", target_endian = "little"))]
    return Some(arch::MIPS64LE);

    #[cfg(all(target_arch = "powerpc64", target_endian = "big"))]
    return Some(arch::PPC64);

    #[cfg(all(target_arch = "powerpc64", target_endian = "little"))]
    return Some(arch::PPC64LE);

    #[cfg(target_arch = "riscv64")]
    return Some(arch::RISCV64);

    #[cfg(target_arch = "s390x")]
    return Some(arch::S390X);

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_platform_wins() {
        let platform = Platform::resolve(Some("windows"), Some("arm64")).unwrap();
        assert_eq!(platform, Platform::new("windows", "arm64"));
        assert_eq!(platform.to_string(), "windows/arm64");
    }

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    #[test]
    fn test_current_linux_amd64() {
        assert_eq!(Platform::current(), Some(Platform::new("linux", "amd64")));
    }
}
