
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use super::models::{DeleteOutcome, NewVectorRecord, VectorRecord};
use super::resolver::{DirectoryResolver, is_plain_component};
use super::{DOCUMENT_EXTENSION, MARKER_FILE};
use crate::{Result, VectorsError};

/// Reads and writes the per-document record files of a course directory
#[derive(Debug, Clone)]
pub struct VectorRecordStore {
    resolver: DirectoryResolver,
}

impl VectorRecordStore {
    #[inline]
    pub fn new(resolver: DirectoryResolver) -> Self {
        Self { resolver }
    }

    /// Replace the document's file with `records` and return their ids in order
    ///
    /// `display_name` is the directory name used if the course has no
    /// directory bound to it yet.
    #[inline]
    pub fn store(
        &self,
        records: Vec<NewVectorRecord>,
        course_id: &str,
        document_id: &str,
        display_name: &str,
    ) -> Result<Vec<String>> {
        validate_document_id(document_id)?;

        for (index, record) in records.iter().enumerate() {
            let payload = &record.payload;
            if payload.course_id != course_id || payload.document_id != document_id {
                return Err(VectorsError::PayloadMismatch {
                    record: index,
                    expected_course: course_id.to_string(),
                    expected_document: document_id.to_string(),
                    found_course: payload.course_id.clone(),
                    found_document: payload.document_id.clone(),
                });
            }
        }

        let records: Vec<VectorRecord> = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| record.into_record(document_id, index))
            .collect();

        let directory = self
            .resolver
            .resolve_for_write(course_id, display_name)
            .inspect_err(|e| error!("Failed to resolve directory for course {}: {}", course_id, e))?;

        let path = write_document(&directory, document_id, &records).inspect_err(|e| {
            error!(
                "Failed to store vectors for document {} of course {} in {:?}: {}",
                document_id, course_id, directory, e
            );
        })?;

        info!(
            "Stored {} vectors for document {} at {:?}",
            records.len(),
            document_id,
            path
        );
        Ok(records.into_iter().map(|record| record.id).collect())
    }

    /// Read back every record of one document
    #[inline]
    pub fn load(&self, document_id: &str, course_id: &str) -> Result<Option<Vec<VectorRecord>>> {
        let Some(directory) = self.resolver.find(course_id)? else {
            return Ok(None);
        };
        let path = document_path(&directory, document_id)?;
        match read_document(&path) {
            Ok(records) => Ok(Some(records)),
            Err(VectorsError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove one document's file; never fails on a missing file
    #[inline]
    pub fn delete(&self, document_id: &str, course_id: &str) -> DeleteOutcome {
        let path = match self
            .resolver
            .find(course_id)
            .and_then(|found| found.map(|dir| document_path(&dir, document_id)).transpose())
        {
            Ok(Some(path)) => path,
            Ok(None) => {
                warn!("No vectors directory found for course {}", course_id);
                return DeleteOutcome::NotFound;
            }
            Err(e) => {
                error!("Failed to delete document {}: {}", document_id, e);
                return DeleteOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted vectors for document {} at {:?}", document_id, path);
                DeleteOutcome::Removed { files: 1 }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("No vectors found at {:?} for document {}", path, document_id);
                DeleteOutcome::NotFound
            }
            Err(e) => {
                error!("Failed to delete {:?}: {}", path, e);
                DeleteOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Path of a document's file inside a course directory
#[inline]
pub fn document_path(directory: &Path, document_id: &str) -> Result<PathBuf> {
    validate_document_id(document_id)?;
    Ok(directory.join(format!("{}.{}", document_id, DOCUMENT_EXTENSION)))
}

/// Document ids become file names, so they must be plain path components
#[inline]
pub fn validate_document_id(document_id: &str) -> Result<()> {
    let reserved = MARKER_FILE
        .strip_suffix(&format!(".{}", DOCUMENT_EXTENSION))
        .unwrap_or(MARKER_FILE);
    if is_plain_component(document_id) && document_id != reserved {
        Ok(())
    } else {
        Err(VectorsError::InvalidDocumentId(document_id.to_string()))
    }
}

/// Whether `path` names a document file rather than the marker or a temp file
#[inline]
pub fn is_document_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    name != MARKER_FILE
        && !name.starts_with('.')
        && path
            .extension()
            .is_some_and(|extension| extension == DOCUMENT_EXTENSION)
        && path.is_file()
}

/// Document files of a course directory, sorted by name
#[inline]
pub fn document_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if is_document_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Write the whole record list in one step
///
/// The JSON goes to a temporary file in the same directory which is then
/// renamed over the target, so readers see either the old or the new file.
#[inline]
pub fn write_document(
    directory: &Path,
    document_id: &str,
    records: &[VectorRecord],
) -> Result<PathBuf> {
    let path = document_path(directory, document_id)?;
    let content = serde_json::to_vec(records)?;
    replace_file(&path, &content)?;
    debug!("Wrote {} bytes to {:?}", content.len(), path);
    Ok(path)
}

/// Atomically replace `path` with `content`
#[inline]
pub fn replace_file(path: &Path, content: &[u8]) -> Result<()> {
    let directory = path
        .parent()
        .ok_or_else(|| VectorsError::Storage(format!("{:?} has no parent directory", path)))?;

    let mut temp = NamedTempFile::new_in(directory)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| VectorsError::Io(e.error))?;
    Ok(())
}

#[inline]
pub fn read_document(path: &Path) -> Result<Vec<VectorRecord>> {
    let content = fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}
