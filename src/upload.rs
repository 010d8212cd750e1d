//! Upload storage
//!
//! Places an incoming file in the upload directory under a name derived from
//! the client's filename plus a clock and random suffix, and reports the
//! public path it is served under.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::logger;

/// URL prefix the upload directory is served under
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Length of the random token in generated names
const TOKEN_LEN: usize = 6;

/// Fresh names tried before giving up on collisions
const MAX_NAME_ATTEMPTS: usize = 8;

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Bytes escaped when a stored name becomes a URL path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to write upload {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no free file name for upload '{0}'")]
    NameExhausted(String),
}

/// A file written to the upload directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub file_name: String,
    pub public_path: String,
}

/// Upload directory handle
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Use `dir` for uploads, creating it if needed
    pub async fn create(dir: impl AsRef<Path>) -> Result<Self, UploadError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| UploadError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `content` under a generated name.
    ///
    /// The file is opened with create-new semantics; an existing file with
    /// the same generated name is never overwritten, a new token is drawn.
    pub async fn save(&self, original_name: &str, content: &[u8]) -> Result<StoredUpload, UploadError> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let file_name = compose_file_name(original_name, unix_millis(), &random_token());
            let path = self.dir.join(&file_name);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(UploadError::Io { path, source }),
            };

            let written = async {
                file.write_all(content).await?;
                file.flush().await
            }
            .await;
            if let Err(source) = written {
                let _ = fs::remove_file(&path).await;
                return Err(UploadError::Io { path, source });
            }

            return Ok(StoredUpload {
                public_path: public_path(&file_name),
                file_name,
            });
        }

        Err(UploadError::NameExhausted(original_name.to_string()))
    }

    /// Remove a stored upload whose task could not be saved
    pub async fn discard(&self, upload: &StoredUpload) {
        let path = self.dir.join(&upload.file_name);
        if let Err(e) = fs::remove_file(&path).await {
            logger::log_warning(&format!(
                "Failed to remove orphaned upload {}: {e}",
                path.display()
            ));
        }
    }
}

/// Build `<base>_<millis>_<token><ext>` from a client-supplied filename.
///
/// Directory components are dropped. The base is lower-cased with each run
/// of whitespace turned into one `_`; the extension keeps its case.
pub fn compose_file_name(original_name: &str, millis: u64, token: &str) -> String {
    let name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let (stem, ext) = split_extension(name);

    let base = stem
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();
    // Keep leading/trailing whitespace visible as a separator, like inner runs
    let base = match (stem.starts_with(char::is_whitespace), stem.ends_with(char::is_whitespace)) {
        _ if base.is_empty() && !stem.is_empty() => "_".to_string(),
        (true, true) => format!("_{base}_"),
        (true, false) => format!("_{base}"),
        (false, true) => format!("{base}_"),
        (false, false) => base,
    };

    format!("{base}_{millis}_{token}{ext}")
}

/// URL under which `file_name` is served, percent-encoded so that `%`, `#`
/// and `?` in client filenames survive the round trip
pub fn public_path(file_name: &str) -> String {
    format!(
        "{PUBLIC_PREFIX}/{}",
        utf8_percent_encode(file_name, PATH_SEGMENT)
    )
}

/// Split at the last dot, ignoring a dot that starts the name
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| char::from(TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())]))
        .collect()
}

fn unix_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
