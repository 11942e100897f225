// File vector store module
// Embedding records live in one JSON file per document, grouped into one directory per course


pub mod lifecycle;
pub mod migration;
pub mod models;
pub mod records;
pub mod resolver;
pub mod search;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::catalog::{CourseCatalog, SqliteCatalog};
use crate::config::Config;
use crate::{Result, VectorsError};

pub use lifecycle::LifecycleManager;
pub use migration::MigrationManager;
pub use models::{
    CourseDirectory, CourseMarker, DeleteOutcome, MigrationReport, NewVectorRecord,
    RecordPayload, ReinitializeReport, ScanIssue, ScanIssueKind, SearchHit, SearchReport,
    StoreStats, VectorRecord,
};
pub use records::VectorRecordStore;
pub use resolver::{DirectoryResolver, sanitize_directory_name};
pub use search::{SimilaritySearchEngine, cosine_similarity};

/// Marker file binding a course directory to its course id
pub const MARKER_FILE: &str = "course_info.json";

/// Extension of per-document record files
pub const DOCUMENT_EXTENSION: &str = "json";

/// Run blocking filesystem work off the async executor
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| VectorsError::Storage(format!("Blocking task failed: {}", e)))?
}

/// Persistent vector store rooted at one directory
///
/// Every operation is a sequence of blocking filesystem calls executed on
/// tokio's blocking pool. There is no locking: callers must not run two writes
/// for the same document at the same time.
#[derive(Clone)]
pub struct FileVectorStore {
    resolver: DirectoryResolver,
    catalog: Option<Arc<dyn CourseCatalog>>,
}

impl std::fmt::Debug for FileVectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileVectorStore")
            .field("root", &self.resolver.root())
            .field("catalog", &self.catalog.is_some())
            .finish()
    }
}

impl FileVectorStore {
    /// Open (creating if needed) a store at `storage_dir`
    #[inline]
    pub fn open<P: AsRef<Path>>(storage_dir: P) -> Result<Self> {
        let root = storage_dir.as_ref();
        fs::create_dir_all(root).map_err(|e| {
            VectorsError::Storage(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;
        let root = fs::canonicalize(root)?;
        info!("Using file vector store at absolute path: {:?}", root);

        Ok(Self {
            resolver: DirectoryResolver::new(root),
            catalog: None,
        })
    }

    /// Open the store configured in `config`, with its course catalog if one is set
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = Self::open(config.storage_path())?;
        match &config.catalog.database_path {
            Some(path) => {
                let catalog = SqliteCatalog::connect(path).await?;
                Ok(store.with_catalog(Arc::new(catalog)))
            }
            None => Ok(store),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn CourseCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[inline]
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// Directory currently holding `course_id`, if any
    #[inline]
    pub async fn course_directory(&self, course_id: &str) -> Result<Option<PathBuf>> {
        let resolver = self.resolver.clone();
        let course_id = course_id.to_string();
        run_blocking(move || resolver.find(&course_id)).await
    }

    /// Write all records of one document, replacing any previous version
    ///
    /// `course_name_hint` names the directory for a course seen for the first
    /// time; without it the catalog is asked, and without a catalog the course
    /// id is used. Failures are returned, never swallowed.
    #[inline]
    pub async fn store(
        &self,
        records: Vec<NewVectorRecord>,
        course_id: &str,
        document_id: &str,
        course_name_hint: Option<&str>,
    ) -> Result<Vec<String>> {
        let display_name = self.display_name(course_id, course_name_hint).await;
        debug!(
            "Storing {} vectors for document {} in course {} ({})",
            records.len(),
            document_id,
            course_id,
            display_name
        );

        let store = VectorRecordStore::new(self.resolver.clone());
        let course_id = course_id.to_string();
        let document_id = document_id.to_string();
        run_blocking(move || store.store(records, &course_id, &document_id, &display_name)).await
    }

    /// Read one document's records back, `None` if it does not exist
    #[inline]
    pub async fn load(&self, document_id: &str, course_id: &str) -> Result<Option<Vec<VectorRecord>>> {
        let store = VectorRecordStore::new(self.resolver.clone());
        let course_id = course_id.to_string();
        let document_id = document_id.to_string();
        run_blocking(move || store.load(&document_id, &course_id)).await
    }

    /// Rank the course's records by cosine similarity to `query`
    #[inline]
    pub async fn search(
        &self,
        query: &[f32],
        course_id: &str,
        limit: usize,
        score_threshold: f32,
    ) -> SearchReport {
        let engine = SimilaritySearchEngine::new(self.resolver.clone());
        let query = query.to_vec();
        let owned_course_id = course_id.to_string();
        let result = run_blocking(move || {
            Ok(engine.search(&query, &owned_course_id, limit, score_threshold))
        })
        .await;

        result.unwrap_or_else(|e| {
            error!("Search in course {} failed: {}", course_id, e);
            SearchReport {
                issues: vec![ScanIssue {
                    path: self.resolver.root().to_path_buf(),
                    kind: ScanIssueKind::Io,
                    message: e.to_string(),
                }],
                ..SearchReport::default()
            }
        })
    }

    #[inline]
    pub async fn delete_document(&self, document_id: &str, course_id: &str) -> DeleteOutcome {
        let store = VectorRecordStore::new(self.resolver.clone());
        let course_id = course_id.to_string();
        let document_id = document_id.to_string();
        run_blocking(move || Ok(store.delete(&document_id, &course_id)))
            .await
            .unwrap_or_else(failed_delete)
    }

    #[inline]
    pub async fn delete_course(&self, course_id: &str) -> DeleteOutcome {
        let lifecycle = LifecycleManager::new(self.resolver.clone());
        let course_id = course_id.to_string();
        run_blocking(move || Ok(lifecycle.delete_course(&course_id)))
            .await
            .unwrap_or_else(failed_delete)
    }

    /// Copy legacy id-named directories into name-based ones
    ///
    /// Without a catalog no course name can be learned, so every legacy
    /// directory is skipped.
    #[inline]
    pub async fn migrate_all(&self) -> MigrationReport {
        let Some(catalog) = &self.catalog else {
            warn!("No course catalog configured, migration cannot name any directory");
            let resolver = self.resolver.clone();
            return match run_blocking(move || migration::pending_directories(&resolver)).await {
                Ok((pending, bound)) => MigrationReport {
                    skipped: pending.len() + bound,
                    ..MigrationReport::default()
                },
                Err(e) => MigrationReport {
                    errors: 1,
                    failures: vec![e.to_string()],
                    ..MigrationReport::default()
                },
            };
        };

        MigrationManager::new(self.resolver.clone(), Arc::clone(catalog))
            .migrate_all()
            .await
    }

    /// Remove every course directory, leaving an empty root
    #[inline]
    pub async fn reinitialize(&self) -> ReinitializeReport {
        let lifecycle = LifecycleManager::new(self.resolver.clone());
        run_blocking(move || Ok(lifecycle.reinitialize()))
            .await
            .unwrap_or_else(|e| ReinitializeReport {
                failures: vec![e.to_string()],
                ..ReinitializeReport::default()
            })
    }

    #[inline]
    pub async fn list_courses(&self) -> Result<Vec<CourseDirectory>> {
        let lifecycle = LifecycleManager::new(self.resolver.clone());
        run_blocking(move || lifecycle.list_courses()).await
    }

    #[inline]
    pub async fn stats(&self) -> Result<StoreStats> {
        let lifecycle = LifecycleManager::new(self.resolver.clone());
        run_blocking(move || lifecycle.stats()).await
    }

    /// Directory name to use for a course that has no directory yet
    async fn display_name(&self, course_id: &str, hint: Option<&str>) -> String {
        if let Some(hint) = hint {
            return sanitize_directory_name(hint);
        }
        let Some(catalog) = &self.catalog else {
            return course_id.to_string();
        };
        match catalog.get_course(course_id).await {
            Ok(Some(info)) => info.directory_name(),
            Ok(None) => course_id.to_string(),
            Err(e) => {
                error!("Error getting course name: {}", e);
                course_id.to_string()
            }
        }
    }
}

fn failed_delete(e: VectorsError) -> DeleteOutcome {
    error!("Delete failed: {}", e);
    DeleteOutcome::Failed {
        reason: e.to_string(),
    }
}
