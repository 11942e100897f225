
use std::fs;
use tracing::{error, info, warn};

use super::MARKER_FILE;
use super::models::{CourseDirectory, DeleteOutcome, ReinitializeReport, StoreStats};
use super::records::{document_files, read_document};
use super::resolver::{DirectoryResolver, dir_name, read_marker};
use crate::Result;

/// Whole-course and whole-store operations
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    resolver: DirectoryResolver,
}

impl LifecycleManager {
    #[inline]
    pub fn new(resolver: DirectoryResolver) -> Self {
        Self { resolver }
    }

    /// Remove every document of a course, then the directory if nothing else is left
    #[inline]
    pub fn delete_course(&self, course_id: &str) -> DeleteOutcome {
        let directory = match self.resolver.find(course_id) {
            Ok(Some(directory)) => directory,
            Ok(None) => {
                warn!("No vectors directory found for course {}", course_id);
                return DeleteOutcome::NotFound;
            }
            Err(e) => {
                error!("Failed to resolve course {}: {}", course_id, e);
                return DeleteOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let files = match document_files(&directory) {
            Ok(files) => files,
            Err(e) => {
                error!("Failed to list {:?}: {}", directory, e);
                return DeleteOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let mut removed = 0;
        for path in &files {
            if let Err(e) = fs::remove_file(path) {
                error!("Failed to delete {:?}: {}", path, e);
                return DeleteOutcome::Failed {
                    reason: format!("removed {} of {} files: {}", removed, files.len(), e),
                };
            }
            removed += 1;
        }

        // The directory is only dropped when the marker is the last thing in it
        let only_marker_left = fs::read_dir(&directory)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .all(|entry| entry.file_name() == MARKER_FILE)
            })
            .unwrap_or(false);
        if only_marker_left {
            if let Err(e) = fs::remove_dir_all(&directory) {
                warn!(
                    "Could not remove course directory {:?}, it may not be empty: {}",
                    directory, e
                );
            }
        } else {
            warn!("Keeping course directory {:?}, it holds other files", directory);
        }

        info!("Deleted {} vector files for course {}", removed, course_id);
        if removed > 0 {
            DeleteOutcome::Removed { files: removed }
        } else {
            DeleteOutcome::NotFound
        }
    }

    /// Delete every file in every course directory, then the directories
    ///
    /// Not transactional: a failure part way leaves the store partly wiped.
    #[inline]
    pub fn reinitialize(&self) -> ReinitializeReport {
        let mut report = ReinitializeReport::default();

        let directories = match self.resolver.course_directories() {
            Ok(directories) => directories,
            Err(e) => {
                error!("Error reinitializing embeddings storage: {}", e);
                report.failures.push(e.to_string());
                return report;
            }
        };

        for directory in directories {
            let entries = match fs::read_dir(&directory) {
                Ok(entries) => entries,
                Err(e) => {
                    error!("Failed to list {:?}: {}", directory, e);
                    report.failures.push(format!("{}: {}", dir_name(&directory), e));
                    continue;
                }
            };

            for entry in entries {
                let path = match entry {
                    Ok(entry) => entry.path(),
                    Err(e) => {
                        report.failures.push(format!("{}: {}", dir_name(&directory), e));
                        continue;
                    }
                };
                if !path.is_file() {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => report.files_removed += 1,
                    Err(e) => {
                        error!("Failed to delete {:?}: {}", path, e);
                        report.failures.push(format!("{}: {}", path.display(), e));
                    }
                }
            }

            match fs::remove_dir(&directory) {
                Ok(()) => report.directories_removed += 1,
                Err(e) => {
                    error!("Failed to remove directory {:?}: {}", directory, e);
                    report.failures.push(format!("{}: {}", dir_name(&directory), e));
                }
            }
        }

        if report.succeeded() {
            info!(
                "Reinitialized embeddings storage: removed {} files from {} directories",
                report.files_removed, report.directories_removed
            );
        } else {
            error!(
                "Reinitialization incomplete: {} failures, store is partly wiped",
                report.failures.len()
            );
        }
        report
    }

    /// Enumerate course directories with their marker and document count
    #[inline]
    pub fn list_courses(&self) -> Result<Vec<CourseDirectory>> {
        let mut courses = Vec::new();
        for path in self.resolver.course_directories()? {
            let marker = read_marker(&path).unwrap_or_else(|e| {
                warn!("Unreadable marker in {:?}: {}", path, e);
                None
            });
            let documents = document_files(&path)?.len();
            courses.push(CourseDirectory {
                name: dir_name(&path).to_string(),
                path,
                marker,
                documents,
            });
        }
        Ok(courses)
    }

    /// Count courses, documents and vectors by reading every document file
    #[inline]
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for directory in self.resolver.course_directories()? {
            stats.courses += 1;
            for path in document_files(&directory)? {
                stats.documents += 1;
                match read_document(&path) {
                    Ok(records) => stats.vectors += records.len(),
                    Err(e) => {
                        warn!("Unreadable document file {:?}: {}", path, e);
                        stats.malformed_files += 1;
                    }
                }
            }
        }
        Ok(stats)
    }
}
