use std::{fs::File, io::Write, path::PathBuf};

use async_trait::async_trait;

use crate::HttpClient;

pub mod blocking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    TarGz,
}

impl ArchiveType {
    pub fn from_filename(name: &str) -> anyhow::Result<ArchiveType> {
        if name.ends_with(".zip") {
            Ok(ArchiveType::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(ArchiveType::TarGz)
        } else {
            Err(anyhow::anyhow!("unknown archive type from {name}"))
        }
    }
}

pub struct ArchiveExtractInfo {
    pub archive_path: PathBuf,
    pub archive_type: ArchiveType,
    pub extracted_dir: PathBuf,
}

/// Hooks run between the download, extract and finish stages.
#[async_trait]
pub trait DownloadExtractCallback {
    async fn on_downloaded(&mut self, info: &ArchiveExtractInfo) -> anyhow::Result<()>;
    async fn on_extracted(&mut self, info: &ArchiveExtractInfo) -> anyhow::Result<()>;
}

struct Download {
    response: reqwest::Response,
    archive_file: File,
    total_size: Option<u64>,
    downloaded_size: u64,
}

impl Download {
    /// Writes the next chunk to disk, `false` once the body is exhausted.
    async fn next_chunk(&mut self) -> anyhow::Result<bool> {
        match self.response.chunk().await? {
            Some(chunk) => {
                self.archive_file.write_all(&chunk)?;
                self.downloaded_size += chunk.len() as u64;
                Ok(true)
            }
            None => {
                self.archive_file.flush()?;
                Ok(false)
            }
        }
    }
}

enum Stage {
    Downloading {
        tmp_dir: blocking::TmpDir,
        info: ArchiveExtractInfo,
        download: Download,
        callback: Box<dyn DownloadExtractCallback + Send>,
    },
    Extracting {
        tmp_dir: blocking::TmpDir,
        info: ArchiveExtractInfo,
        callback: Box<dyn DownloadExtractCallback + Send>,
    },
    Stopped,
}

/// Download-then-extract job, advanced step by step so the caller can report
/// progress between steps.
pub struct DownloadExtractState(Stage);

impl DownloadExtractState {
    pub async fn start(
        client: &HttpClient,
        url: &str,
        archive_type: ArchiveType,
        tmp_dir: PathBuf,
        callback: Box<dyn DownloadExtractCallback + Send>,
    ) -> anyhow::Result<Self> {
        log::debug!("Downloading {url}");
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to download '{}': {}\n{}",
                url,
                response.status(),
                response.text().await?
            );
        }

        let (archive_file, archive_path, mut tmp_dir) = crate::spawn_blocking(move || {
            let tmp_dir = blocking::TmpDir::create(tmp_dir)?;
            let archive_path = tmp_dir.path.join("download");
            let archive_file = File::create(&archive_path)?;
            Ok((archive_file, archive_path, tmp_dir))
        })
        .await?;

        tmp_dir.should_not_block = true;
        let extracted_dir = tmp_dir.path.join("extracted");
        let total_size = response.content_length();

        Ok(DownloadExtractState(Stage::Downloading {
            tmp_dir,
            info: ArchiveExtractInfo {
                archive_path,
                archive_type,
                extracted_dir,
            },
            download: Download {
                response,
                archive_file,
                total_size,
                downloaded_size: 0,
            },
            callback,
        }))
    }

    pub fn status(&self) -> crate::Status {
        match &self.0 {
            Stage::Downloading { download, .. } => crate::Status::InProgress {
                name: "Downloading".into(),
                progress_ratio: download
                    .total_size
                    .map(|total| (download.downloaded_size, total)),
            },
            Stage::Extracting { .. } => crate::Status::InProgress {
                name: "Extracting".into(),
                progress_ratio: None,
            },
            Stage::Stopped => crate::Status::Stopped,
        }
    }

    pub async fn advance(self) -> anyhow::Result<Self> {
        match self.0 {
            Stage::Downloading {
                tmp_dir,
                info,
                mut download,
                mut callback,
            } => {
                let more = match download.next_chunk().await {
                    Ok(more) => more,
                    Err(e) => return Err(discard(tmp_dir, e).await),
                };
                if more {
                    return Ok(DownloadExtractState(Stage::Downloading {
                        tmp_dir,
                        info,
                        download,
                        callback,
                    }));
                }

                drop(download);
                if let Err(e) = callback.on_downloaded(&info).await {
                    return Err(discard(tmp_dir, e).await);
                }
                Ok(DownloadExtractState(Stage::Extracting {
                    tmp_dir,
                    info,
                    callback,
                }))
            }
            Stage::Extracting {
                tmp_dir,
                info,
                mut callback,
            } => {
                let extracted = crate::spawn_blocking(move || {
                    blocking::extract_archive(
                        info.archive_type,
                        &info.archive_path,
                        &info.extracted_dir,
                    )?;
                    Ok(info)
                })
                .await;
                let info = match extracted {
                    Ok(info) => info,
                    Err(e) => return Err(discard(tmp_dir, e).await),
                };

                let result = callback.on_extracted(&info).await;
                remove_tmp_dir(tmp_dir).await;
                result?;
                Ok(DownloadExtractState(Stage::Stopped))
            }
            Stage::Stopped => Err(anyhow::anyhow!("Already stopped")),
        }
    }
}

/// Removes the temporary directory off the async thread.
async fn remove_tmp_dir(mut tmp_dir: blocking::TmpDir) {
    log::debug!("Removing {}", tmp_dir.path.display());
    let removed = crate::spawn_blocking(move || {
        tmp_dir.should_not_block = false;
        drop(tmp_dir);
        Ok(())
    })
    .await;
    if let Err(e) = removed {
        log::warn!("{e}");
    }
}

async fn discard(tmp_dir: blocking::TmpDir, err: anyhow::Error) -> anyhow::Error {
    remove_tmp_dir(tmp_dir).await;
    err
}
