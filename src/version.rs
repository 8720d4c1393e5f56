//! Normalization and ordering of Go version strings.
//!
//! Go names its releases `go1.25.0`, `go1.21rc2`, `go1.10beta1`, and older
//! releases leave out the patch number (`go1.20`). Versions are first brought
//! into a `v`-prefixed form and then compared with semantic-versioning
//! precedence via [`semver::Version`].

use std::cmp::Ordering;
use std::fmt;

use semver::{BuildMetadata, Prerelease};
use smol_str::{format_smolstr, SmolStr};

/// A version string with the `go` prefix removed and a leading `v`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedVersion(SmolStr);

impl NormalizedVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Precedence key of this version, or `None` if it is not a valid version.
    ///
    /// A missing minor or patch number counts as `0`, Go-style suffixes such as
    /// `rc2` become the pre-release `rc.2`, and build metadata is dropped.
    pub fn to_semver(&self) -> Option<semver::Version> {
        let rest = self.0.strip_prefix('v')?;
        let rest = match rest.split_once('+') {
            Some((rest, _build)) => rest,
            None => rest,
        };

        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, pre.to_owned()),
            None => match rest.find(|c: char| c.is_ascii_alphabetic()) {
                Some(index) => (&rest[..index], split_attached_pre_release(&rest[index..])),
                None => (rest, String::new()),
            },
        };

        let mut parts = core.split('.');
        let major = parse_number(parts.next()?)?;
        let minor = match parts.next() {
            Some(minor) => parse_number(minor)?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(patch) => parse_number(patch)?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }

        let pre = if pre.is_empty() {
            Prerelease::EMPTY
        } else {
            Prerelease::new(&pre).ok()?
        };

        Some(semver::Version {
            major,
            minor,
            patch,
            pre,
            build: BuildMetadata::EMPTY,
        })
    }
}

impl fmt::Display for NormalizedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strips an optional `go` prefix and makes sure the result starts with `v`.
pub fn normalize(version: &str) -> NormalizedVersion {
    let version = version.strip_prefix("go").unwrap_or(version);
    if version.starts_with('v') {
        NormalizedVersion(version.into())
    } else {
        NormalizedVersion(format_smolstr!("v{version}"))
    }
}

/// Semantic-version ordering of two normalized versions.
///
/// Invalid versions sort before every valid one and are equal to each other,
/// matching Go's `golang.org/x/mod/semver`.
pub fn compare(a: &NormalizedVersion, b: &NormalizedVersion) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    a.to_semver().cmp(&b.to_semver())
}

fn parse_number(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if part.len() > 1 && part.starts_with('0') {
        return None;
    }
    part.parse().ok()
}

// "rc12" -> "rc.12", so that numeric parts compare as numbers.
fn split_attached_pre_release(suffix: &str) -> String {
    let mut result = String::with_capacity(suffix.len() + 2);
    let mut prev_is_digit: Option<bool> = None;
    for c in suffix.chars() {
        let is_digit = c.is_ascii_digit();
        if c != '.' && prev_is_digit.is_some_and(|prev| prev != is_digit) {
            result.push('.');
        }
        result.push(c);
        prev_is_digit = if c == '.' { None } else { Some(is_digit) };
    }
    result
}
