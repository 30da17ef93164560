use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),
    #[error("cannot derive a file name from model URL {0}")]
    BadUrl(String),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where a model comes from, as written in settings or on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelLocation {
    Local(PathBuf),
    Remote { url: String, file_name: String },
}

impl ModelLocation {
    /// `http://` and `https://` strings are remote, everything else is a path.
    pub fn parse(location: &str) -> Result<Self, ModelResolveError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let file_name = location
                .split(['?', '#'])
                .next()
                .and_then(|s| s.rsplit('/').next())
                .filter(|name| !name.is_empty())
                .ok_or_else(|| ModelResolveError::BadUrl(location.to_string()))?;
            Ok(Self::Remote {
                url: location.to_string(),
                file_name: file_name.to_string(),
            })
        } else {
            Ok(Self::Local(PathBuf::from(location)))
        }
    }
}

/// Turn a model location into a file on disk.
///
/// Local paths are used as-is (relative paths are also tried under
/// `bundled_dir`). Remote models are looked up in the user cache directory and
/// downloaded there on first use.
pub fn resolve(
    location: &ModelLocation,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    match location {
        ModelLocation::Local(path) => resolve_local(path, bundled_dir),
        ModelLocation::Remote { url, file_name } => {
            let cache_dir = model_cache_dir()?;
            resolve_remote(url, file_name, &cache_dir, progress)
        }
    }
}

fn resolve_local(path: &Path, bundled_dir: Option<&Path>) -> Result<PathBuf, ModelResolveError> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(dir) = bundled_dir.filter(|_| path.is_relative()) {
        let bundled = dir.join(path);
        if bundled.exists() {
            return Ok(bundled);
        }
    }
    Err(ModelResolveError::NotFound(path.to_path_buf()))
}

fn resolve_remote(
    url: &str,
    file_name: &str,
    cache_dir: &Path,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(file_name);
    if cached_path.exists() {
        return Ok(cached_path);
    }
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading model {file_name} from {url}");
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/LiveFakeCheck/models/`
/// - Linux: `$XDG_CACHE_HOME/LiveFakeCheck/models/` or `~/.cache/LiveFakeCheck/models/`
/// - Windows: `%LOCALAPPDATA%/LiveFakeCheck/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_inner(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let write_err = |source: std::io::Error| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}
