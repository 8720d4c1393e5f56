use std::cmp::Ordering;

use crate::catalog::{Artifact, ArtifactKind, Release};
use crate::platform::Platform;
use crate::version::{compare, normalize};

/// Outcome of resolving a catalog against the installed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing in the catalog is newer than the installed version.
    UpToDate,
    /// The upgrade target has no archive for the requested platform.
    NoArtifactForPlatform { release: Release },
    Upgrade { release: Release, artifact: Artifact },
}

/// Releases newer than `local`, in catalog order.
pub fn newer_releases<'a>(catalog: &'a [Release], local: &str) -> Vec<&'a Release> {
    let local = normalize(local);
    catalog
        .iter()
        .filter(|release| compare(&normalize(&release.version), &local) == Ordering::Greater)
        .collect()
}

/// The upgrade target: the first release in catalog order that is newer than `local`.
///
/// Not the maximum: the index is expected newest-first, so on an unsorted
/// catalog this is whichever newer release comes first.
pub fn find_upgrade<'a>(catalog: &'a [Release], local: &str) -> Option<&'a Release> {
    newer_releases(catalog, local).into_iter().next()
}

/// First artifact built for `os`/`arch`, matched exactly.
pub fn select_artifact<'a>(release: &'a Release, os: &str, arch: &str) -> Option<&'a Artifact> {
    release
        .files
        .iter()
        .find(|file| file.os == os && file.arch == arch)
}

pub fn select_artifact_of_kind<'a>(
    release: &'a Release,
    os: &str,
    arch: &str,
    kind: ArtifactKind,
) -> Option<&'a Artifact> {
    release
        .files
        .iter()
        .find(|file| file.os == os && file.arch == arch && file.kind == kind)
}

/// Picks the upgrade target and its archive for `platform`.
pub fn resolve(catalog: &[Release], local: &str, platform: &Platform) -> Resolution {
    let Some(release) = find_upgrade(catalog, local) else {
        return Resolution::UpToDate;
    };
    archive_for(release, platform)
}

/// Pairs an explicitly chosen release with its archive for `platform`.
pub fn archive_for(release: &Release, platform: &Platform) -> Resolution {
    match select_artifact_of_kind(release, &platform.os, &platform.arch, ArtifactKind::Archive) {
        Some(artifact) => Resolution::Upgrade {
            release: release.clone(),
            artifact: artifact.clone(),
        },
        None => Resolution::NoArtifactForPlatform {
            release: release.clone(),
        },
    }
}

pub fn retain_stable(catalog: &mut Vec<Release>) {
    catalog.retain(|release| release.stable);
}
