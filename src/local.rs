//! Discovery of the installed Go version.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use smol_str::SmolStr;

pub const VERSION_FILE: &str = "VERSION";

pub fn go_binary(install_dir: &Path) -> PathBuf {
    let name = if cfg!(windows) { "go.exe" } else { "go" };
    install_dir.join("bin").join(name)
}

/// First line of `<install_dir>/VERSION`, e.g. `go1.24.3`.
pub fn from_version_file(install_dir: &Path) -> anyhow::Result<Option<SmolStr>> {
    let path = install_dir.join(VERSION_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    Ok(content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(SmolStr::from))
}

/// Extracts the version from `go version` output such as
/// `go version go1.24.3 linux/amd64`.
pub fn parse_go_version_output(output: &str) -> Option<&str> {
    let rest = output.trim().strip_prefix("go version ")?;
    let version = rest.split_whitespace().next()?;
    version.starts_with("go").then_some(version)
}

/// Runs `<go> version`, `Ok(None)` if the binary cannot be started.
pub fn from_go_command(go: &Path) -> anyhow::Result<Option<SmolStr>> {
    log::debug!("Running {} version", go.display());
    let output = match Command::new(go).arg("version").output() {
        Ok(output) => output,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to run {} version", go.display()));
        }
    };
    if !output.status.success() {
        anyhow::bail!(
            "{} version exited with {}: {}",
            go.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_go_version_output(&stdout).map(SmolStr::from))
}

/// The installed version: VERSION file first, then the installed `go`
/// binary, then whatever `go` is on `PATH`.
pub fn detect(install_dir: &Path) -> anyhow::Result<SmolStr> {
    if let Some(version) = from_version_file(install_dir)? {
        log::debug!("Found {} in {}", version, install_dir.display());
        return Ok(version);
    }
    if let Some(version) = from_go_command(&go_binary(install_dir))? {
        return Ok(version);
    }
    if let Some(version) = from_go_command(Path::new("go"))? {
        return Ok(version);
    }
    anyhow::bail!(
        "No Go installation found in {} or on PATH, pass --local-version",
        install_dir.display()
    )
}
