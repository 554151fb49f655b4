//! Upload sessions
//!
//! A session ties a stored upload to the metadata a later split needs. The
//! session id is the name of the upload's staging directory.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{SplitterError, SplitterResult};
use crate::naming::sanitize;

/// Prefix of every staging directory under the upload root.
pub const STAGING_PREFIX: &str = "excel_splitter_";

/// Default age after which a session is evicted.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// An uploaded workbook awaiting extraction. Immutable once registered.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub source_path: PathBuf,
    pub storage_dir: PathBuf,
    pub original_filename: String,
    pub sheet_names: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A staging directory holding one upload.
///
/// Dropped uploads take their directory with them; [`StagedUpload::commit`]
/// hands ownership of the directory to the registry instead.
#[derive(Debug)]
pub struct StagedUpload {
    dir: TempDir,
    file_path: PathBuf,
}

impl StagedUpload {
    /// Name of the staging directory, which becomes the session id.
    pub fn id(&self) -> String {
        self.dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn write(&self, bytes: &[u8]) -> SplitterResult<()> {
        let mut file = fs::File::create(&self.file_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }

    /// Register the upload and keep its directory on disk.
    pub fn commit(
        self,
        registry: &SessionRegistry,
        original_filename: &str,
        sheet_names: Vec<String>,
    ) -> SplitterResult<String> {
        let file_path = self.file_path;
        let dir = self.dir.keep();
        registry
            .create(&file_path, original_filename, sheet_names)
            .inspect_err(|_| {
                let _ = fs::remove_dir_all(&dir);
            })
    }
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: Vec<String>,
    /// Expired but leased by an in-flight request; retried on a later pass.
    pub in_use: Vec<String>,
    pub failed_deletes: usize,
}

/// In-memory session map shared by all request handlers.
#[derive(Debug)]
pub struct SessionRegistry {
    root: PathBuf,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// `root` is where staging directories are created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a staging directory for an upload called `filename`.
    pub fn stage(&self, filename: &str) -> SplitterResult<StagedUpload> {
        fs::create_dir_all(&self.root)?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)?;
        let file_path = dir.path().join(sanitize(filename));
        Ok(StagedUpload { dir, file_path })
    }

    /// Register a stored upload; the id is the name of its parent directory.
    pub fn create(
        &self,
        source_path: &Path,
        original_filename: &str,
        sheet_names: Vec<String>,
    ) -> SplitterResult<String> {
        let storage_dir = source_path
            .parent()
            .ok_or_else(|| SplitterError::Session("upload has no storage directory".into()))?
            .to_path_buf();
        let id = storage_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SplitterError::Session("storage directory has no name".into()))?;

        let session = Session {
            id: id.clone(),
            source_path: source_path.to_path_buf(),
            storage_dir,
            original_filename: original_filename.to_string(),
            sheet_names,
            created_at: Utc::now(),
        };

        let mut sessions = self.lock();
        if sessions.contains_key(&id) {
            return Err(SplitterError::Session(format!("session {} already exists", id)));
        }
        sessions.insert(id.clone(), Arc::new(session));
        info!(session_id = %id, "Session created");
        Ok(id)
    }

    /// Lease a session. The lease keeps it from being swept while held.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Evict sessions older than `max_age`.
    pub fn sweep(&self, max_age: Duration) -> SweepReport {
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.sweep_before(cutoff)
    }

    /// Evict sessions created before `cutoff` and delete their storage.
    ///
    /// Sessions currently leased through [`SessionRegistry::get`] are left
    /// in place. Deletion failures are logged and counted only.
    pub fn sweep_before(&self, cutoff: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let mut expired = Vec::new();

        {
            let mut sessions = self.lock();
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| s.created_at < cutoff)
                .map(|(id, _)| id.clone())
                .collect();

            for id in ids {
                let leased = sessions.get(&id).is_some_and(|s| Arc::strong_count(s) > 1);
                if leased {
                    debug!(session_id = %id, "Expired session in use, keeping");
                    report.in_use.push(id);
                } else if let Some(session) = sessions.remove(&id) {
                    expired.push(session);
                }
            }
        }

        for session in expired {
            if let Err(e) = self.remove_storage(&session) {
                warn!(session_id = %session.id, error = %e, "Failed to delete session storage");
                report.failed_deletes += 1;
            }
            report.evicted.push(session.id.clone());
        }

        if !report.evicted.is_empty() {
            info!(evicted = report.evicted.len(), "Swept expired sessions");
        }
        report
    }

    fn remove_storage(&self, session: &Session) -> SplitterResult<()> {
        if !session.storage_dir.starts_with(&self.root) {
            return Err(SplitterError::Session(format!(
                "refusing to delete {} outside upload root",
                session.storage_dir.display()
            )));
        }
        match fs::remove_dir_all(&session.storage_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a client-supplied upload path.
    ///
    /// Only existing files stored directly in a staging directory of the
    /// upload root are accepted.
    pub fn resolve_upload_path(&self, temp_file: &str) -> Option<PathBuf> {
        let root = self.root.canonicalize().ok()?;
        let path = Path::new(temp_file).canonicalize().ok()?;
        let staging = path.parent()?;
        let staged = staging.parent() == Some(root.as_path())
            && staging
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(STAGING_PREFIX));
        (staged && path.is_file()).then_some(path)
    }

    /// Lease the session whose staging directory holds `path`, if any.
    pub fn lease_upload(&self, path: &Path) -> Option<Arc<Session>> {
        let id = path.parent()?.file_name()?.to_string_lossy().into_owned();
        self.get(&id)
    }
}
