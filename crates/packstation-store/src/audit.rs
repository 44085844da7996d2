//! # Filesystem Audit Store
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FINALIZE                                                               │
//! │       │                                                                 │
//! │       ├── save_serials          {root}/202410/8042.sn_export  replace   │
//! │       ├── save                  {root}/202410/8042            create-new│
//! │       └── save_cross_reference  {root}/202410/8043            replace   │
//! │                                                                         │
//! │  Once the primary record exists the order counts as shipped, and it is  │
//! │  never overwritten. Cross-references only point at existing records.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Replaced files are written to a `.tmp` sibling and renamed into place, so
//! a reader never sees half a file and a retried FINALIZE can rewrite them.
//! Records are CRLF text, the serial export is JSON.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use packstation_core::audit::{cross_reference_lines, cross_reference_target, AuditKey};
use packstation_core::{AuditStore, BackendError, Order, SerialEntry};

use crate::error::{audit_error, StoreError, StoreResult};

const LINE_END: &str = "\r\n";

#[derive(Debug, Clone)]
pub struct FsAuditStore {
    root: PathBuf,
}

impl FsAuditStore {
    /// Period directories are created on demand below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsAuditStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, key: &AuditKey) -> PathBuf {
        self.root.join(key.period()).join(key.record_name())
    }

    pub fn serial_export_path(&self, key: &AuditKey) -> PathBuf {
        self.root.join(key.period()).join(key.serial_export_name())
    }

    /// Lines of a stored record, `None` if there is none.
    pub async fn read_record(&self, key: &AuditKey) -> StoreResult<Option<Vec<String>>> {
        let path = self.record_path(key);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text.lines().map(str::to_owned).collect())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    pub async fn read_serials(&self, key: &AuditKey) -> StoreResult<Option<Vec<SerialEntry>>> {
        let path = self.serial_export_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn ensure_period_dir(&self, key: &AuditKey) -> StoreResult<()> {
        let dir = self.root.join(key.period());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(dir, e))
    }

    async fn write_new(&self, path: &Path, content: &[u8]) -> StoreResult<()> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::RecordExists(path.to_path_buf()))
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        file.write_all(content)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        file.sync_all().await.map_err(|e| StoreError::io(path, e))
    }

    async fn write_replace(&self, path: &Path, content: &[u8]) -> StoreResult<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, content)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    async fn save_record(&self, order: &Order, lines: &[String]) -> StoreResult<AuditKey> {
        let key = AuditKey::for_order(order);
        self.ensure_period_dir(&key).await?;
        self.write_new(&self.record_path(&key), crlf(lines).as_bytes())
            .await?;
        info!(record = %key, lines = lines.len(), "Audit record written");
        Ok(key)
    }

    async fn save_link(&self, appended: &Order, primary: &AuditKey) -> StoreResult<AuditKey> {
        let key = AuditKey::for_order(appended);
        self.ensure_period_dir(&key).await?;
        let lines = cross_reference_lines(appended, primary);
        self.write_replace(&self.record_path(&key), crlf(&lines).as_bytes())
            .await?;
        info!(record = %key, primary = %primary, "Cross-reference written");
        Ok(key)
    }

    async fn save_serial_export(&self, order: &Order, serials: &[SerialEntry]) -> StoreResult<()> {
        let key = AuditKey::for_order(order);
        self.ensure_period_dir(&key).await?;
        let json = serde_json::to_vec_pretty(serials)?;
        self.write_replace(&self.serial_export_path(&key), &json)
            .await?;
        info!(record = %key, serials = serials.len(), "Serial export written");
        Ok(())
    }
}

fn crlf(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push_str(LINE_END);
    }
    out
}

fn logged(err: StoreError) -> BackendError {
    error!(error = %err, "Audit store failure");
    audit_error(err)
}

#[async_trait]
impl AuditStore for FsAuditStore {
    async fn exists(&self, order: &Order) -> Result<bool, BackendError> {
        let path = self.record_path(&AuditKey::for_order(order));
        let found = fs::try_exists(&path)
            .await
            .map_err(|e| logged(StoreError::io(&path, e)))?;
        debug!(path = %path.display(), found, "Audit record lookup");
        Ok(found)
    }

    async fn shipped_under(&self, order: &Order) -> Result<Option<AuditKey>, BackendError> {
        let key = AuditKey::for_order(order);
        let lines = self.read_record(&key).await.map_err(logged)?;
        Ok(lines.map(|lines| cross_reference_target(&lines).unwrap_or(key)))
    }

    async fn save(&self, order: &Order, lines: &[String]) -> Result<AuditKey, BackendError> {
        self.save_record(order, lines).await.map_err(logged)
    }

    async fn save_cross_reference(
        &self,
        appended: &Order,
        primary: &AuditKey,
    ) -> Result<AuditKey, BackendError> {
        self.save_link(appended, primary).await.map_err(logged)
    }

    async fn save_serials(&self, order: &Order, serials: &[SerialEntry]) -> Result<(), BackendError> {
        self.save_serial_export(order, serials).await.map_err(logged)
    }
}
