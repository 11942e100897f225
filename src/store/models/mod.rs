
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Chunk type recorded when the ingestion side does not provide one
pub const DEFAULT_CHUNK_TYPE: &str = "semantic";

fn default_chunk_type() -> String {
    DEFAULT_CHUNK_TYPE.to_string()
}

/// One embedding unit as it is persisted inside a document file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier for this embedding
    pub id: String,
    /// The embedding itself; its length is fixed by the embedding model
    pub vector: Vec<f32>,
    /// Text and provenance of the chunk this embedding represents
    pub payload: RecordPayload,
}

/// Payload stored alongside every embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    /// Course the chunk belongs to; always matches the containing directory
    pub course_id: String,
    /// Document the chunk belongs to; always matches the containing file name
    pub document_id: String,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// The chunk text
    pub content: String,
    /// Free-form metadata supplied by the ingestion pipeline
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default = "default_chunk_type")]
    pub chunk_type: String,
}

impl RecordPayload {
    #[inline]
    pub fn new(
        course_id: impl Into<String>,
        document_id: impl Into<String>,
        chunk_index: u32,
        content: impl Into<String>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            document_id: document_id.into(),
            chunk_index,
            content: content.into(),
            metadata: Map::new(),
            chunk_type: default_chunk_type(),
        }
    }
}

/// A record handed to the store, possibly without an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewVectorRecord {
    pub id: Option<String>,
    pub vector: Vec<f32>,
    pub payload: RecordPayload,
}

impl NewVectorRecord {
    /// Turn this into a stored record, falling back to `"{document_id}_{index}"`
    #[inline]
    pub fn into_record(self, document_id: &str, index: usize) -> VectorRecord {
        VectorRecord {
            id: self
                .id
                .unwrap_or_else(|| format!("{}_{}", document_id, index)),
            vector: self.vector,
            payload: self.payload,
        }
    }
}

impl From<VectorRecord> for NewVectorRecord {
    #[inline]
    fn from(record: VectorRecord) -> Self {
        Self {
            id: Some(record.id),
            vector: record.vector,
            payload: record.payload,
        }
    }
}

/// Contents of `course_info.json`, binding a directory to a course id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMarker {
    pub id: String,
    pub name: String,
}

/// One ranked match returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: RecordPayload,
}

/// Why a file or record was left out of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanIssueKind {
    /// The file or directory could not be read
    Io,
    /// The file is not a valid JSON array of records
    Malformed,
    /// A record's vector length differs from the query's
    DimensionMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub kind: ScanIssueKind,
    pub message: String,
}

/// Result of a similarity search
///
/// A search never fails as a whole. Files that could not be scanned are listed
/// in `issues` so "nothing matched" stays distinguishable from "something broke".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub hits: Vec<SearchHit>,
    pub issues: Vec<ScanIssue>,
    /// Number of document files that were parsed successfully
    pub files_scanned: usize,
}

impl SearchReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    #[inline]
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.id.as_str()).collect()
    }
}

/// Result of deleting a document or a whole course
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// At least one document file was removed
    Removed { files: usize },
    /// There was nothing to remove
    NotFound,
    /// Removal was attempted and failed; some files may already be gone
    Failed { reason: String },
}

impl DeleteOutcome {
    #[inline]
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }
}

/// Counters reported by a migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Legacy directories whose documents were copied into a named directory
    pub migrated: usize,
    /// Directories that needed no work or whose course name is unknown
    pub skipped: usize,
    /// Directories that failed to migrate
    pub errors: usize,
    pub files_copied: usize,
    pub failures: Vec<String>,
}

/// Result of wiping the whole store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinitializeReport {
    pub directories_removed: usize,
    pub files_removed: usize,
    pub failures: Vec<String>,
}

impl ReinitializeReport {
    #[inline]
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A course directory found under the storage root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDirectory {
    pub name: String,
    pub path: PathBuf,
    pub marker: Option<CourseMarker>,
    pub documents: usize,
}

impl CourseDirectory {
    /// The course id this directory answers to, if it can be told
    #[inline]
    pub fn course_id(&self) -> &str {
        self.marker
            .as_ref()
            .map_or_else(|| legacy_course_id(&self.name), |marker| marker.id.as_str())
    }
}

/// Counts gathered by scanning every document file in the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub courses: usize,
    pub documents: usize,
    pub vectors: usize,
    pub malformed_files: usize,
}

/// Course id implied by a legacy directory name: the text before the first `_`
#[inline]
pub fn legacy_course_id(directory_name: &str) -> &str {
    directory_name
        .split_once('_')
        .map_or(directory_name, |(id, _)| id)
}
