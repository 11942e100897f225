
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::MARKER_FILE;
use super::models::CourseMarker;
use crate::{Result, VectorsError};

/// Maps course ids to their directories under the storage root
///
/// The marker file inside a directory is the only authoritative binding. A
/// directory without a marker answers to a course id only if it is named after
/// it exactly or starts with `"{course_id}_"`, which is how older stores were
/// laid out.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    #[inline]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Immediate subdirectories of the root, sorted by name
    #[inline]
    pub fn course_directories(&self) -> Result<Vec<PathBuf>> {
        let mut directories = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                directories.push(entry.path());
            }
        }
        directories.sort();
        Ok(directories)
    }

    /// Find the directory holding `course_id` without creating anything
    #[inline]
    pub fn find(&self, course_id: &str) -> Result<Option<PathBuf>> {
        validate_course_id(course_id)?;

        let legacy_prefix = format!("{}_", course_id);
        let mut legacy_exact = None;
        let mut legacy_prefixed = None;

        for directory in self.course_directories()? {
            match read_marker(&directory) {
                Ok(Some(marker)) if marker.id == course_id => {
                    debug!("Resolved course {} to {:?} by marker", course_id, directory);
                    return Ok(Some(directory));
                }
                // Bound to another course; never a legacy candidate
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable marker in {:?}: {}", directory, e),
            }

            let Some(name) = directory.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == course_id {
                legacy_exact.get_or_insert_with(|| directory.clone());
            } else if name.starts_with(&legacy_prefix) {
                legacy_prefixed.get_or_insert_with(|| directory.clone());
            }
        }

        let found = legacy_exact.or(legacy_prefixed);
        if let Some(directory) = &found {
            debug!(
                "Resolved course {} to legacy directory {:?}",
                course_id, directory
            );
        }
        Ok(found)
    }

    /// The directory whose marker names `course_id`, ignoring legacy names
    #[inline]
    pub fn bound_directory(&self, course_id: &str) -> Result<Option<PathBuf>> {
        validate_course_id(course_id)?;
        for directory in self.course_directories()? {
            match read_marker(&directory) {
                Ok(Some(marker)) if marker.id == course_id => return Ok(Some(directory)),
                Ok(_) => {}
                Err(e) => warn!("Ignoring unreadable marker in {:?}: {}", directory, e),
            }
        }
        Ok(None)
    }

    /// Find the directory holding `course_id`, creating `root/course_id` if none exists
    #[inline]
    pub fn resolve(&self, course_id: &str) -> Result<PathBuf> {
        if let Some(directory) = self.find(course_id)? {
            return Ok(directory);
        }

        let directory = self.root.join(course_id);
        fs::create_dir_all(&directory)?;
        info!("Created course directory {:?}", directory);
        Ok(directory)
    }

    /// Pick the directory new documents for `course_id` are written to
    ///
    /// A marker-bound directory always wins so a course keeps its directory
    /// when its name changes. Otherwise the directory is `root/display_name`
    /// (or, when the name is unknown, an existing legacy directory), and its
    /// marker is written if it has none yet.
    #[inline]
    pub fn resolve_for_write(&self, course_id: &str, display_name: &str) -> Result<PathBuf> {
        validate_course_id(course_id)?;
        let mut display_name = sanitize_directory_name(display_name);
        if !is_plain_component(&display_name) {
            display_name = course_id.to_string();
        }

        let directory = match self.find(course_id)? {
            Some(found) if read_marker(&found).ok().flatten().is_some() => return Ok(found),
            Some(legacy) if display_name == course_id || dir_name(&legacy) == display_name => {
                legacy
            }
            _ => self.named_directory(course_id, &display_name)?,
        };

        fs::create_dir_all(&directory)?;
        let marker = CourseMarker {
            id: course_id.to_string(),
            name: dir_name(&directory).to_string(),
        };
        if write_marker_if_absent(&directory, &marker)? {
            info!(
                "Bound course {} to directory {:?}",
                course_id, marker.name
            );
        }
        Ok(directory)
    }

    /// `root/display_name`, unless that is already bound to a different course
    fn named_directory(&self, course_id: &str, display_name: &str) -> Result<PathBuf> {
        let candidates = [
            display_name.to_string(),
            format!("{}_{}", display_name, course_id),
        ];
        for candidate in candidates {
            let directory = self.root.join(&candidate);
            match read_marker(&directory) {
                Ok(Some(marker)) if marker.id != course_id => {
                    warn!(
                        "Directory {:?} already belongs to course {}",
                        candidate, marker.id
                    );
                }
                Ok(_) => return Ok(directory),
                Err(e) => warn!("Skipping directory {:?}: {}", candidate, e),
            }
        }
        Err(VectorsError::Storage(format!(
            "No free directory name for course {} ({})",
            course_id, display_name
        )))
    }
}

/// Read `course_info.json` from a directory; `Ok(None)` if there is none
#[inline]
pub fn read_marker(directory: &Path) -> Result<Option<CourseMarker>> {
    let content = match fs::read(directory.join(MARKER_FILE)) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&content)?))
}

/// Create the marker unless one exists; returns whether it was written
///
/// The marker appears with its full content or not at all, and a readable
/// marker is never rewritten. If another writer creates it first, its content
/// must name the same course. An unreadable marker is left over from an
/// interrupted write and gets replaced.
#[inline]
pub fn write_marker_if_absent(directory: &Path, marker: &CourseMarker) -> Result<bool> {
    let path = directory.join(MARKER_FILE);
    let content = serde_json::to_vec(marker)?;

    let mut temp = NamedTempFile::new_in(directory)?;
    temp.write_all(&content)?;
    temp.as_file().sync_all()?;

    let temp = match temp.persist_noclobber(&path) {
        Ok(_) => return Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => e.file,
        Err(e) => return Err(e.error.into()),
    };

    match read_marker(directory) {
        Ok(Some(existing)) if existing.id != marker.id => Err(VectorsError::Storage(format!(
            "Directory {:?} is bound to course {}, not {}",
            directory, existing.id, marker.id
        ))),
        Ok(Some(_)) => Ok(false),
        Ok(None) => Err(VectorsError::Storage(format!(
            "Marker in {:?} vanished while binding course {}",
            directory, marker.id
        ))),
        Err(e) => {
            warn!("Replacing unreadable marker in {:?}: {}", directory, e);
            temp.persist(&path).map_err(|e| e.error)?;
            Ok(true)
        }
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
#[inline]
pub fn sanitize_directory_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Reject ids that would escape the storage root when used as a path
#[inline]
pub fn validate_course_id(course_id: &str) -> Result<()> {
    if is_plain_component(course_id) {
        Ok(())
    } else {
        Err(VectorsError::InvalidCourseId(course_id.to_string()))
    }
}

pub(crate) fn is_plain_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0'])
}

pub(crate) fn dir_name(directory: &Path) -> &str {
    directory
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
}
