use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

/// Receipt file storage. Files are staged first and only become visible
/// under the public directory once promoted.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Writes `body` to the staging area and returns the final stored name.
    async fn stage(&self, original_name: &str, body: Bytes) -> anyhow::Result<String>;
    async fn promote(&self, stored_name: &str) -> anyhow::Result<()>;
    /// Removes a file from staging or from the public directory, whichever holds it.
    async fn discard(&self, stored_name: &str) -> anyhow::Result<()>;
}

/// Files are staged in a directory next to `root`, never under it: `root` is
/// published at `/uploads`. Both must live on one filesystem so `promote`
/// is a plain rename.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    staging: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>, staging: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        let staging = staging.into();
        if staging.starts_with(&root) {
            anyhow::bail!(
                "staging dir {} must not be inside the upload dir {}",
                staging.display(),
                root.display()
            );
        }
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        tokio::fs::create_dir_all(&staging)
            .await
            .with_context(|| format!("create staging dir {}", staging.display()))?;
        Ok(Self { root, staging })
    }

    fn staged_path(&self, stored_name: &str) -> PathBuf {
        self.staging.join(stored_name)
    }

    fn public_path(&self, stored_name: &str) -> PathBuf {
        self.root.join(stored_name)
    }
}

#[async_trait]
impl ReceiptStore for LocalStorage {
    async fn stage(&self, original_name: &str, body: Bytes) -> anyhow::Result<String> {
        let stored_name = stored_name_for(original_name);
        let path = self.staged_path(&stored_name);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write staged receipt {}", path.display()))?;
        debug!(%stored_name, bytes = body.len(), "receipt staged");
        Ok(stored_name)
    }

    async fn promote(&self, stored_name: &str) -> anyhow::Result<()> {
        let from = self.staged_path(stored_name);
        let to = self.public_path(stored_name);
        tokio::fs::rename(&from, &to)
            .await
            .with_context(|| format!("promote receipt {}", stored_name))?;
        Ok(())
    }

    async fn discard(&self, stored_name: &str) -> anyhow::Result<()> {
        for path in [self.staged_path(stored_name), self.public_path(stored_name)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "remove receipt failed");
                    return Err(e).with_context(|| format!("discard receipt {}", stored_name));
                }
            }
        }
        Ok(())
    }
}

/// `uploads` -> `.uploads-staging`, in the same parent directory.
pub fn default_staging_dir(upload_dir: &Path) -> anyhow::Result<PathBuf> {
    let name = upload_dir
        .file_name()
        .with_context(|| format!("UPLOAD_DIR {} must name a directory", upload_dir.display()))?;
    Ok(upload_dir.with_file_name(format!(".{}-staging", name.to_string_lossy())))
}

/// `<unix-millis>-<8 hex>-<sanitized original name>`
pub fn stored_name_for(original_name: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", millis, &nonce[..8], sanitize_file_name(original_name))
}

/// Keeps the last path component and replaces anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(original: &str) -> String {
    lazy_static! {
        static ref UNSAFE_RE: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
    }
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned = UNSAFE_RE.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "receipt".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Keeps original names as stored names and records every call;
    /// fails `promote` for names listed in `fail_promote`.
    #[derive(Default)]
    pub(crate) struct RecordingStore {
        pub fail_promote: Vec<String>,
        pub staged: Mutex<Vec<(String, Bytes)>>,
        pub promoted: Mutex<Vec<String>>,
        pub discarded: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReceiptStore for RecordingStore {
        async fn stage(&self, original_name: &str, body: Bytes) -> anyhow::Result<String> {
            self.staged.lock().unwrap().push((original_name.to_string(), body));
            Ok(original_name.to_string())
        }
        async fn promote(&self, n: &str) -> anyhow::Result<()> {
            if self.fail_promote.iter().any(|f| f == n) {
                anyhow::bail!("disk full");
            }
            self.promoted.lock().unwrap().push(n.to_string());
            Ok(())
        }
        async fn discard(&self, n: &str) -> anyhow::Result<()> {
            self.discarded.lock().unwrap().push(n.to_string());
            Ok(())
        }
    }
}
