//! Replacing the Go installation with a downloaded release archive.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use smol_str::SmolStr;

use crate::catalog::{Artifact, Endpoint, Release};
use crate::io::{
    blocking, ArchiveExtractInfo, ArchiveType, DownloadExtractCallback, DownloadExtractState,
};
use crate::HttpClient;

pub const TMP_PREFIX: &str = ".tmp.goup.";

/// What would be downloaded for a resolved release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadInfo {
    pub version: SmolStr,
    pub url: String,
    pub filename: SmolStr,
    pub sha256: SmolStr,
    pub size: u64,
}

impl DownloadInfo {
    pub fn new(endpoint: &Endpoint, release: &Release, artifact: &Artifact) -> Self {
        DownloadInfo {
            version: release.version.clone(),
            url: endpoint.download_url(artifact),
            filename: artifact.filename.clone(),
            sha256: artifact.sha256.clone(),
            size: artifact.size,
        }
    }
}

struct InstallCustomAction {
    sha256: SmolStr,
    size: u64,
    install_dir: PathBuf,
}

#[async_trait]
impl DownloadExtractCallback for InstallCustomAction {
    async fn on_downloaded(&mut self, info: &ArchiveExtractInfo) -> anyhow::Result<()> {
        crate::spawn_blocking({
            let sha256 = self.sha256.clone();
            let size = self.size;
            let archive_path = info.archive_path.clone();
            move || {
                blocking::verify_size(size, &archive_path)?;
                blocking::verify_sha256(&sha256, &archive_path)
            }
        })
        .await
    }

    async fn on_extracted(&mut self, info: &ArchiveExtractInfo) -> anyhow::Result<()> {
        let extracted_dir = info.extracted_dir.clone();
        let install_dir = self.install_dir.clone();
        crate::spawn_blocking(move || {
            let new_root = blocking::unpacked_root(&extracted_dir)?;
            log::info!("Installing into {}", install_dir.display());
            blocking::replace_dir(&new_root, &install_dir)
        })
        .await
    }
}

pub struct InstallArgs<'a> {
    pub client: &'a HttpClient,
    pub info: &'a DownloadInfo,
    pub install_dir: &'a Path,
    /// Where the archive is downloaded and unpacked before it is moved.
    pub download_dir: &'a Path,
}

impl InstallArgs<'_> {
    pub async fn install(self) -> anyhow::Result<DownloadExtractState> {
        let archive_type = ArchiveType::from_filename(&self.info.filename)?;
        let tmp_dir = self
            .download_dir
            .join(format!("{}{}", TMP_PREFIX, self.info.version));
        log::debug!("Tmp dir: {}", tmp_dir.display());
        let (tmp_dir, exists) = crate::spawn_blocking(move || {
            let exists = tmp_dir.exists();
            Ok((tmp_dir, exists))
        })
        .await?;
        if exists {
            anyhow::bail!(
                "\"{}\" is being installed ({} exists)",
                self.info.version,
                tmp_dir.display()
            );
        }

        DownloadExtractState::start(
            self.client,
            &self.info.url,
            archive_type,
            tmp_dir,
            Box::new(InstallCustomAction {
                sha256: self.info.sha256.clone(),
                size: self.info.size,
                install_dir: self.install_dir.to_path_buf(),
            }),
        )
        .await
    }
}

/// Runs the freshly installed `go version`.
pub async fn installed_version(install_dir: &Path) -> anyhow::Result<Option<SmolStr>> {
    let go = crate::local::go_binary(install_dir);
    crate::spawn_blocking(move || crate::local::from_go_command(&go)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ArtifactKind;
    use crate::testing::{serve_once, test_client};
    use flate2::{write::GzEncoder, Compression};
    use sha2::Digest;

    /// A release archive holding only `go/VERSION`.
    fn go_archive(version: &str) -> Vec<u8> {
        let content = format!("{version}\n");
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        builder
            .append_data(&mut header, "go/VERSION", content.as_bytes())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// An existing installation plus an empty download dir.
    fn setup(dir: &Path) -> (PathBuf, PathBuf) {
        let install_dir = dir.join("usr").join("local").join("go");
        std::fs::create_dir_all(install_dir.join("bin")).unwrap();
        std::fs::write(install_dir.join(crate::local::VERSION_FILE), "go1.24.0\n").unwrap();
        let download_dir = dir.join("dl");
        std::fs::create_dir(&download_dir).unwrap();
        (install_dir, download_dir)
    }

    async fn run_to_end(args: InstallArgs<'_>) -> anyhow::Result<()> {
        let mut state = args.install().await?;
        while !matches!(state.status(), crate::Status::Stopped) {
            state = state.advance().await?;
        }
        Ok(())
    }

    fn entries(dir: &Path) -> Vec<std::ffi::OsString> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect()
    }

    #[test]
    fn test_download_info() {
        let artifact = Artifact {
            filename: "go1.25.0.linux-amd64.tar.gz".into(),
            os: "linux".into(),
            arch: "amd64".into(),
            version: "go1.25.0".into(),
            sha256: "2852af0c".into(),
            size: 42,
            kind: ArtifactKind::Archive,
        };
        let release = Release {
            version: "go1.25.0".into(),
            stable: true,
            files: vec![artifact.clone()],
        };
        let info = DownloadInfo::new(&Endpoint::new("https://go.dev/dl/"), &release, &artifact);
        assert_eq!(info.url, "https://go.dev/dl/go1.25.0.linux-amd64.tar.gz");
        assert_eq!(info.size, 42);

        let yaml = serde_yaml_ng::to_string(&info).unwrap();
        assert!(yaml.contains("version: go1.25.0"));
        assert!(yaml.contains("sha256: 2852af0c"));
    }

    #[tokio::test]
    async fn test_busy_tmp_dir_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(format!("{TMP_PREFIX}go1.25.0"))).unwrap();
        let info = DownloadInfo {
            version: "go1.25.0".into(),
            url: "http://127.0.0.1:9/go1.25.0.linux-amd64.tar.gz".into(),
            filename: "go1.25.0.linux-amd64.tar.gz".into(),
            sha256: "".into(),
            size: 0,
        };
        let client = HttpClient::with_client(
            Default::default(),
            crate::DEFAULT_USER_AGENT,
            reqwest::Client::new(),
        );
        let err = InstallArgs {
            client: &client,
            info: &info,
            install_dir: &dir.path().join("go"),
            download_dir: dir.path(),
        }
        .install()
        .await
        .err()
        .unwrap();
        assert!(err.to_string().contains("is being installed"), "{err}");
    }

    #[tokio::test]
    async fn test_install_replaces_existing_tree() {
        let dir = tempfile::tempdir().unwrap();
        let (install_dir, download_dir) = setup(dir.path());
        let archive = go_archive("go1.25.0");
        let sha256 = hex::encode(sha2::Sha256::digest(&archive));
        let size = archive.len() as u64;
        let (url, server) = serve_once("200 OK", archive);
        let info = DownloadInfo {
            version: "go1.25.0".into(),
            url: format!("{url}go1.25.0.linux-amd64.tar.gz"),
            filename: "go1.25.0.linux-amd64.tar.gz".into(),
            sha256: sha256.into(),
            size,
        };

        let client = test_client();
        run_to_end(InstallArgs {
            client: &client,
            info: &info,
            install_dir: &install_dir,
            download_dir: &download_dir,
        })
        .await
        .unwrap();
        server.join().unwrap();

        assert_eq!(
            std::fs::read_to_string(install_dir.join("VERSION")).unwrap(),
            "go1.25.0\n"
        );
        assert!(!install_dir.join("bin").exists());
        assert!(entries(&download_dir).is_empty());
        assert_eq!(entries(install_dir.parent().unwrap()), vec!["go"]);
    }

    #[tokio::test]
    async fn test_install_checksum_mismatch_keeps_existing_tree() {
        let dir = tempfile::tempdir().unwrap();
        let (install_dir, download_dir) = setup(dir.path());
        let archive = go_archive("go1.25.0");
        let size = archive.len() as u64;
        let (url, server) = serve_once("200 OK", archive);
        let info = DownloadInfo {
            version: "go1.25.0".into(),
            url: format!("{url}go1.25.0.linux-amd64.tar.gz"),
            filename: "go1.25.0.linux-amd64.tar.gz".into(),
            sha256: "00".repeat(32).into(),
            size,
        };

        let client = test_client();
        let err = run_to_end(InstallArgs {
            client: &client,
            info: &info,
            install_dir: &install_dir,
            download_dir: &download_dir,
        })
        .await
        .unwrap_err();
        server.join().unwrap();

        assert!(err.to_string().contains("sha256"), "{err}");
        assert_eq!(
            std::fs::read_to_string(install_dir.join("VERSION")).unwrap(),
            "go1.24.0\n"
        );
        assert!(install_dir.join("bin").is_dir());
        assert!(entries(&download_dir).is_empty());
        assert_eq!(entries(install_dir.parent().unwrap()), vec!["go"]);
    }
}
