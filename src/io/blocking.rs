use std::path::{Path, PathBuf};

use anyhow::Context;
use flate2::read::GzDecoder;
use sha2::Digest;
use zip::ZipArchive;

/// Directory removed when dropped, unless [`TmpDir::keep`] was called.
pub struct TmpDir {
    pub path: PathBuf,
    pub should_not_block: bool,
    kept: bool,
}

impl TmpDir {
    /// Guards `path` without creating it.
    pub fn new(path: PathBuf) -> Self {
        TmpDir {
            path,
            should_not_block: false,
            kept: false,
        }
    }

    pub fn create(path: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(TmpDir::new(path))
    }

    /// Disarms the guard and returns the path, leaving the directory in place.
    pub fn keep(mut self) -> PathBuf {
        self.kept = true;
        std::mem::take(&mut self.path)
    }

    fn remove(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::error!(
                    "Failed to remove directory '{}': {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for TmpDir {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        if self.should_not_block && !crate::is_cancelled() {
            log::warn!("Blocking remove: {}", self.path.display());
        }

        self.remove();
    }
}

pub(crate) fn verify_size(expected: u64, path: &Path) -> anyhow::Result<()> {
    if expected == 0 {
        return Ok(());
    }
    let actual = std::fs::metadata(path)?.len();
    if actual != expected {
        anyhow::bail!("size mismatch: expected {expected} bytes, downloaded {actual}");
    }
    Ok(())
}

pub(crate) fn verify_sha256(expected: &str, path: &Path) -> anyhow::Result<()> {
    if expected.is_empty() {
        log::warn!("No checksum published for {}", path.display());
        return Ok(());
    }

    let expected_bytes = hex::decode(expected).context("invalid sha256 in release index")?;
    let mut file = std::fs::File::open(path)?;
    let mut hasher = sha2::Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    if hasher.finalize().as_slice() != expected_bytes.as_slice() {
        anyhow::bail!("sha256 verification failed");
    }

    log::debug!("Hash verification passed");
    Ok(())
}

pub(crate) fn extract_archive(
    archive_type: super::ArchiveType,
    archive_path: &Path,
    extracted_dir: &Path,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(extracted_dir)?;
    let archive_file = std::fs::File::open(archive_path)?;
    match archive_type {
        super::ArchiveType::Zip => {
            let mut archive = ZipArchive::new(archive_file)?;

            for i in 0..archive.len() {
                let mut file = archive.by_index(i)?;
                let Some(name) = file.enclosed_name() else {
                    log::warn!("Skipping unsafe archive entry '{}'", file.name());
                    continue;
                };
                let out_path = extracted_dir.join(name);

                if file.is_dir() {
                    std::fs::create_dir_all(&out_path)?;
                } else {
                    if let Some(p) = out_path.parent() {
                        std::fs::create_dir_all(p)?;
                    }
                    let mut out_file = std::fs::File::create(&out_path)?;
                    std::io::copy(&mut file, &mut out_file)?;
                }

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;

                    if let Some(mode) = file.unix_mode() {
                        let permissions = std::fs::Permissions::from_mode(mode);
                        std::fs::set_permissions(&out_path, permissions)?;
                    }
                }
            }
        }
        super::ArchiveType::TarGz => {
            let mut archive = tar::Archive::new(GzDecoder::new(archive_file));
            archive.set_preserve_permissions(true);
            archive.unpack(extracted_dir).with_context(|| {
                anyhow::anyhow!(
                    "Failed to unpack tar.gz archive '{}' into '{}'.",
                    archive_path.display(),
                    extracted_dir.display()
                )
            })?;
        }
    }

    Ok(())
}

/// The directory an archive unpacked into: its single top-level directory
/// (`go/` for official releases), or `extracted_dir` itself.
pub(crate) fn unpacked_root(extracted_dir: &Path) -> std::io::Result<PathBuf> {
    let entries = std::fs::read_dir(extracted_dir)?
        .take(2)
        .collect::<Result<Vec<_>, _>>()?;

    if let [entry] = entries.as_slice() {
        let path = entry.path();
        if path.is_dir() {
            return Ok(path);
        }
    }
    Ok(extracted_dir.to_path_buf())
}

/// Renames `src` to `dest`, copying when they live on different filesystems.
pub(crate) fn move_dir(src: &Path, dest: &Path) -> anyhow::Result<()> {
    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(err) => {
            log::debug!(
                "Rename {} -> {} failed ({}), copying instead",
                src.display(),
                dest.display(),
                err
            );
            std::fs::create_dir_all(dest)?;
            let mut options = fs_extra::dir::CopyOptions::new();
            options.content_only = true;
            fs_extra::dir::move_dir(src, dest, &options).with_context(|| {
                format!("Failed to move {} to {}", src.display(), dest.display())
            })?;
            Ok(())
        }
    }
}

/// Replaces `install_dir` with the tree at `new_root`.
///
/// The new tree is first moved next to `install_dir`, so the old installation
/// is only removed once the new one is on the same filesystem.
pub(crate) fn replace_dir(new_root: &Path, install_dir: &Path) -> anyhow::Result<()> {
    let parent = install_dir
        .parent()
        .ok_or_else(|| anyhow::anyhow!("{} has no parent directory", install_dir.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let file_name = install_dir
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("{} has no file name", install_dir.display()))?;
    let mut staged_name = std::ffi::OsString::from(crate::install::TMP_PREFIX);
    staged_name.push(file_name);
    let staged = TmpDir::new(parent.join(staged_name));
    if staged.path.exists() {
        std::fs::remove_dir_all(&staged.path)?;
    }

    move_dir(new_root, &staged.path)?;

    if install_dir.exists() {
        log::info!("Removing {}", install_dir.display());
        std::fs::remove_dir_all(install_dir)
            .with_context(|| format!("Failed to remove {}", install_dir.display()))?;
    }
    std::fs::rename(&staged.path, install_dir).with_context(|| {
        format!("Failed to move new installation to {}", install_dir.display())
    })?;
    // Renamed into place, so the staged path no longer exists.
    staged.keep();
    Ok(())
}

/// Finds an executable named `name` in the directories of `PATH`.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    let file_name = if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_owned()
    };
    std::env::split_paths(&path)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

/// Whether a file can be created in `dir` (or in its closest existing ancestor).
pub fn is_writable(dir: &Path) -> bool {
    let Some(existing) = dir.ancestors().find(|p| p.exists()) else {
        return false;
    };
    tempfile::Builder::new()
        .prefix(crate::install::TMP_PREFIX)
        .tempfile_in(existing)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_verify_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download");
        std::fs::write(&path, b"").unwrap();

        verify_sha256(EMPTY_SHA256, &path).unwrap();
        verify_sha256("", &path).unwrap();
        assert!(verify_sha256(&"00".repeat(32), &path).is_err());
        assert!(verify_sha256("not hex", &path).is_err());
    }

    #[test]
    fn test_verify_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download");
        std::fs::write(&path, b"12345").unwrap();

        verify_size(5, &path).unwrap();
        verify_size(0, &path).unwrap();
        assert!(verify_size(6, &path).is_err());
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("go.tar.gz");
        {
            let file = std::fs::File::create(&archive_path).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
            let mut builder = tar::Builder::new(encoder);
            let content = b"go1.25.0\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "go/VERSION", &content[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let extracted = dir.path().join("extracted");
        extract_archive(super::super::ArchiveType::TarGz, &archive_path, &extracted).unwrap();
        let root = unpacked_root(&extracted).unwrap();
        assert_eq!(root, extracted.join("go"));
        assert_eq!(
            std::fs::read_to_string(root.join("VERSION")).unwrap(),
            "go1.25.0\n"
        );
    }

    #[test]
    fn test_replace_dir() {
        let dir = tempfile::tempdir().unwrap();
        let install_dir = dir.path().join("local").join("go");
        std::fs::create_dir_all(install_dir.join("bin")).unwrap();
        std::fs::write(install_dir.join("VERSION"), "go1.24.3").unwrap();
        std::fs::write(install_dir.join("bin").join("stale"), "").unwrap();

        let new_root = dir.path().join("extracted").join("go");
        std::fs::create_dir_all(&new_root).unwrap();
        std::fs::write(new_root.join("VERSION"), "go1.25.0").unwrap();

        replace_dir(&new_root, &install_dir).unwrap();

        assert_eq!(
            std::fs::read_to_string(install_dir.join("VERSION")).unwrap(),
            "go1.25.0"
        );
        assert!(!install_dir.join("bin").exists());
        assert!(!new_root.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("local"))
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_replace_dir_fresh_install() {
        let dir = tempfile::tempdir().unwrap();
        let install_dir = dir.path().join("usr").join("local").join("go");
        let new_root = dir.path().join("go");
        std::fs::create_dir_all(&new_root).unwrap();
        std::fs::write(new_root.join("VERSION"), "go1.25.0").unwrap();

        replace_dir(&new_root, &install_dir).unwrap();
        assert!(install_dir.join("VERSION").is_file());
    }

    #[test]
    fn test_is_writable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_writable(dir.path()));
        assert!(is_writable(&dir.path().join("not").join("yet")));
    }

    #[test]
    fn test_tmp_dir_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp");
        let tmp_dir = TmpDir::create(path.clone()).unwrap();
        std::fs::write(tmp_dir.path.join("download"), b"").unwrap();
        drop(tmp_dir);
        assert!(!path.exists());
    }

    #[test]
    fn test_tmp_dir_keep() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp");
        let kept = TmpDir::create(path.clone()).unwrap().keep();
        assert_eq!(kept, path);
        assert!(path.is_dir());
    }
}
