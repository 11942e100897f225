
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::models::{CourseMarker, MigrationReport, legacy_course_id};
use super::records::{document_files, replace_file};
use super::resolver::{DirectoryResolver, dir_name, read_marker, write_marker_if_absent};
use super::run_blocking;
use crate::Result;
use crate::catalog::CourseCatalog;

/// A directory without a marker, waiting to be migrated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyDirectory {
    pub path: PathBuf,
    pub course_id: String,
}

/// What happened to one legacy directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    /// Marker or documents were written
    Migrated { files_copied: usize },
    /// The named directory already held everything
    UpToDate,
}

/// Copies id-named course directories into name-based directories with markers
///
/// Originals are never modified or removed, so a run can be repeated at any
/// time. Files already present in the target directory are left alone.
pub struct MigrationManager {
    resolver: DirectoryResolver,
    catalog: Arc<dyn CourseCatalog>,
}

impl std::fmt::Debug for MigrationManager {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationManager")
            .field("root", &self.resolver.root())
            .finish_non_exhaustive()
    }
}

impl MigrationManager {
    #[inline]
    pub fn new(resolver: DirectoryResolver, catalog: Arc<dyn CourseCatalog>) -> Self {
        Self { resolver, catalog }
    }

    /// Migrate every legacy directory under the storage root
    #[inline]
    pub async fn migrate_all(&self) -> MigrationReport {
        let mut report = MigrationReport::default();

        let resolver = self.resolver.clone();
        let pending = match run_blocking(move || pending_directories(&resolver)).await {
            Ok((pending, already_bound)) => {
                report.skipped += already_bound;
                pending
            }
            Err(e) => {
                error!("Failed to scan storage root for migration: {}", e);
                report.errors += 1;
                report.failures.push(e.to_string());
                return report;
            }
        };

        for legacy in pending {
            let name = match self.catalog.get_course(&legacy.course_id).await {
                Ok(Some(info)) => info.directory_name(),
                Ok(None) => String::new(),
                Err(e) => {
                    warn!("Could not look up course {}: {}", legacy.course_id, e);
                    String::new()
                }
            };
            if name.is_empty() || name == legacy.course_id {
                warn!("Could not find course name for ID {}", legacy.course_id);
                report.skipped += 1;
                continue;
            }

            let resolver = self.resolver.clone();
            let source = legacy.clone();
            let target_name = name.clone();
            let step = run_blocking(move || migrate_directory(&resolver, &source, &target_name)).await;

            match step {
                Ok(MigrationStep::Migrated { files_copied }) => {
                    info!(
                        "Migrated {} files from {} to {}",
                        files_copied,
                        dir_name(&legacy.path),
                        name
                    );
                    report.migrated += 1;
                    report.files_copied += files_copied;
                }
                Ok(MigrationStep::UpToDate) => {
                    debug!("{} is already migrated to {}", dir_name(&legacy.path), name);
                    report.skipped += 1;
                }
                Err(e) => {
                    error!("Error migrating course {}: {}", dir_name(&legacy.path), e);
                    report.errors += 1;
                    report
                        .failures
                        .push(format!("{}: {}", dir_name(&legacy.path), e));
                }
            }
        }

        info!(
            "Migration finished: {} migrated, {} skipped, {} errors",
            report.migrated, report.skipped, report.errors
        );
        report
    }
}

/// Directories without a marker, plus the number of directories that have one
#[inline]
pub fn pending_directories(resolver: &DirectoryResolver) -> Result<(Vec<LegacyDirectory>, usize)> {
    let mut pending = Vec::new();
    let mut already_bound = 0;

    for path in resolver.course_directories()? {
        match read_marker(&path) {
            Ok(Some(_)) => {
                already_bound += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Treating {:?} as unmigrated, marker unreadable: {}", path, e);
            }
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let course_id = legacy_course_id(name).to_string();
        if course_id.is_empty() {
            continue;
        }
        pending.push(LegacyDirectory { path, course_id });
    }

    Ok((pending, already_bound))
}

/// Copy one legacy directory into `root/target_name` and bind it to the course
#[inline]
pub fn migrate_directory(
    resolver: &DirectoryResolver,
    legacy: &LegacyDirectory,
    target_name: &str,
) -> Result<MigrationStep> {
    // A course keeps the directory its marker already sits in
    if let Some(bound) = resolver.bound_directory(&legacy.course_id)? {
        let files_copied = copy_missing_documents(&legacy.path, &bound)?;
        if files_copied > 0 {
            info!(
                "Course {} is already bound to {}, copied legacy documents there",
                legacy.course_id,
                dir_name(&bound)
            );
        }
        return Ok(if files_copied > 0 {
            MigrationStep::Migrated { files_copied }
        } else {
            MigrationStep::UpToDate
        });
    }

    let target = resolver.root().join(target_name);
    let marker = CourseMarker {
        id: legacy.course_id.clone(),
        name: target_name.to_string(),
    };

    if target.exists() && same_directory(&target, &legacy.path)? {
        // The legacy directory already has the right name; it only lacks a marker
        let written = write_marker_if_absent(&target, &marker)?;
        return Ok(if written {
            MigrationStep::Migrated { files_copied: 0 }
        } else {
            MigrationStep::UpToDate
        });
    }

    fs::create_dir_all(&target)?;
    let marker_written = write_marker_if_absent(&target, &marker)?;
    let files_copied = copy_missing_documents(&legacy.path, &target)?;

    Ok(if marker_written || files_copied > 0 {
        MigrationStep::Migrated { files_copied }
    } else {
        MigrationStep::UpToDate
    })
}

/// Copy documents of `source` that `target` does not have yet
fn copy_missing_documents(source: &Path, target: &Path) -> Result<usize> {
    let mut files_copied = 0;
    for document in document_files(source)? {
        let Some(file_name) = document.file_name() else {
            continue;
        };
        let destination = target.join(file_name);
        if destination.exists() {
            continue;
        }
        replace_file(&destination, &fs::read(&document)?)?;
        files_copied += 1;
    }
    Ok(files_copied)
}

fn same_directory(a: &Path, b: &Path) -> Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}
