use serde::Deserialize;
use smol_str::SmolStr;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use std::{path::PathBuf, sync::atomic::AtomicBool};

pub mod catalog;
pub mod install;
pub mod io;
pub mod local;
pub mod platform;
pub mod resolver;
pub mod select;
#[cfg(test)]
mod testing;
pub mod version;

/// Index the official Go releases are published under.
pub const DEFAULT_DL_URL: &str = "https://go.dev/dl/";

/// The index answers differently to unknown clients, so look like a browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
pub struct UrlMirrorEntry {
    from: String,
    to: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UrlMirror {
    mirror: Vec<UrlMirrorEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub mirror: Option<UrlMirror>,
    pub dl_url: Option<String>,
    pub install_dir: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
}

pub async fn spawn_blocking<T: Send + 'static>(
    f: impl FnOnce() -> anyhow::Result<T> + Send + 'static,
) -> anyhow::Result<T> {
    match tokio::task::spawn_blocking(f).await {
        Ok(r) => r,
        Err(_) => Err(anyhow::anyhow!("Failed to join spawned IO task")),
    }
}

pub struct HttpClient {
    mirror: UrlMirror,
    user_agent: SmolStr,
    client_inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(mirror: UrlMirror, user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client_inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(mirror, user_agent, client_inner))
    }

    pub fn with_client(mirror: UrlMirror, user_agent: &str, client: reqwest::Client) -> Self {
        HttpClient {
            mirror,
            user_agent: user_agent.into(),
            client_inner: client,
        }
    }

    /// Builds a GET request, rewriting the URL through the first matching mirror.
    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let url = self.apply_mirror(url);
        self.client_inner
            .get(url)
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
    }

    fn apply_mirror(&self, url: &str) -> String {
        for entry in &self.mirror.mirror {
            if let Some(rest) = url.strip_prefix(&entry.from) {
                let mut result = String::new();
                result.push_str(entry.to.as_str());
                result.push_str(rest);
                log::debug!("Applying mirror {} => {}", url, result);
                return result;
            }
        }

        url.to_owned()
    }
}

pub enum Status {
    InProgress {
        name: SmolStr,
        progress_ratio: Option<(u64, u64)>,
    },
    Stopped,
}

static CANCELLED: AtomicBool = AtomicBool::new(false);

pub fn set_cancelled() {
    CANCELLED.store(true, std::sync::atomic::Ordering::Relaxed);
}

pub fn is_cancelled() -> bool {
    CANCELLED.load(std::sync::atomic::Ordering::Relaxed)
}

/// The run was interrupted with Ctrl-C.
#[derive(Debug, thiserror::Error)]
#[error("Cancelled")]
pub struct Cancelled;

/// Turns the output of a [`CancellableFuture`] into the run's result.
pub fn cancelled_as_error<T>(output: Option<anyhow::Result<T>>) -> anyhow::Result<T> {
    output.unwrap_or_else(|| Err(Cancelled.into()))
}

pub struct CancellableFuture<Fut> {
    inner: Pin<Box<Fut>>,
}

impl<Fut> CancellableFuture<Fut> {
    pub fn new(inner: Fut) -> Self {
        CancellableFuture {
            inner: Box::pin(inner),
        }
    }
}

impl<Fut> Future for CancellableFuture<Fut>
where
    Fut: Future,
{
    type Output = Option<Fut::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if is_cancelled() {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll(cx) {
            Poll::Ready(output) => Poll::Ready(Some(output)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror(from: &str, to: &str) -> UrlMirror {
        UrlMirror {
            mirror: vec![UrlMirrorEntry {
                from: from.into(),
                to: to.into(),
            }],
        }
    }

    #[test]
    fn test_mirror_rewrites_matching_prefix() {
        let client = HttpClient::with_client(
            mirror("https://go.dev/dl/", "https://mirrors.example.com/golang/"),
            DEFAULT_USER_AGENT,
            reqwest::Client::new(),
        );
        assert_eq!(
            client.apply_mirror("https://go.dev/dl/go1.25.0.linux-amd64.tar.gz"),
            "https://mirrors.example.com/golang/go1.25.0.linux-amd64.tar.gz"
        );
        assert_eq!(
            client.apply_mirror("https://example.org/other"),
            "https://example.org/other"
        );
    }

    #[test]
    fn test_cancelled_as_error() {
        assert_eq!(cancelled_as_error(Some(Ok(7))).unwrap(), 7);
        let err = cancelled_as_error::<()>(None).unwrap_err();
        assert!(err.is::<Cancelled>());
        assert_eq!(err.to_string(), "Cancelled");
        let err = cancelled_as_error::<()>(Some(Err(anyhow::anyhow!("boom")))).unwrap_err();
        assert!(!err.is::<Cancelled>());
    }

    #[test]
    fn test_config_from_yaml() {
        let config: Config = serde_yaml_ng::from_str(
            r#"
mirror:
  - from: https://go.dev/dl/
    to: https://golang.google.cn/dl/
install_dir: /opt/go
timeout_secs: 10
"#,
        )
        .unwrap();
        assert_eq!(config.mirror.unwrap().mirror.len(), 1);
        assert_eq!(config.install_dir, Some(PathBuf::from("/opt/go")));
        assert_eq!(config.timeout_secs, Some(10));
        assert!(config.dl_url.is_none());
    }
}
