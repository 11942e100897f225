
use std::path::Path;
use tracing::{debug, info, warn};

use super::models::{ScanIssue, ScanIssueKind, SearchHit, SearchReport};
use super::records::{document_files, read_document};
use super::resolver::DirectoryResolver;
use crate::VectorsError;

/// Brute-force cosine similarity search over one course directory
///
/// There is no index: every query reads every document file of the course,
/// so the cost grows linearly with the number of stored vectors.
#[derive(Debug, Clone)]
pub struct SimilaritySearchEngine {
    resolver: DirectoryResolver,
}

impl SimilaritySearchEngine {
    #[inline]
    pub fn new(resolver: DirectoryResolver) -> Self {
        Self { resolver }
    }

    /// Rank the course's records by similarity to `query`
    ///
    /// Records scoring below `score_threshold` are dropped, the rest are sorted
    /// by descending score (ties keep scan order) and cut to `limit`. A missing
    /// course yields an empty report; unreadable files are reported in
    /// `issues` and skipped.
    #[inline]
    pub fn search(
        &self,
        query: &[f32],
        course_id: &str,
        limit: usize,
        score_threshold: f32,
    ) -> SearchReport {
        let mut report = SearchReport::default();

        let directory = match self.resolver.find(course_id) {
            Ok(Some(directory)) => directory,
            Ok(None) => {
                warn!("No vectors directory found for course {}", course_id);
                return report;
            }
            Err(e) => {
                warn!("Failed to resolve course {}: {}", course_id, e);
                report.issues.push(issue(self.resolver.root(), &e));
                return report;
            }
        };

        let files = match document_files(&directory) {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list {:?}: {}", directory, e);
                report.issues.push(issue(&directory, &e));
                return report;
            }
        };

        for path in files {
            let records = match read_document(&path) {
                Ok(records) => records,
                Err(e) => {
                    warn!("Skipping unreadable document file {:?}: {}", path, e);
                    report.issues.push(issue(&path, &e));
                    continue;
                }
            };
            report.files_scanned += 1;

            for record in records {
                let Some(score) = cosine_similarity(query, &record.vector) else {
                    debug!(
                        "Record {} has {} dimensions, query has {}",
                        record.id,
                        record.vector.len(),
                        query.len()
                    );
                    report.issues.push(ScanIssue {
                        path: path.clone(),
                        kind: ScanIssueKind::DimensionMismatch,
                        message: format!(
                            "record {} has {} dimensions, query has {}",
                            record.id,
                            record.vector.len(),
                            query.len()
                        ),
                    });
                    continue;
                };

                if score >= score_threshold {
                    report.hits.push(SearchHit {
                        id: record.id,
                        score,
                        payload: record.payload,
                    });
                }
            }
        }

        // Stable, so equal scores stay in file-name then chunk order
        report.hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        let matched = report.hits.len();
        report.hits.truncate(limit);

        info!(
            "Found {} similar vectors from {} files in course {}",
            matched, report.files_scanned, course_id
        );
        report
    }
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)`
///
/// Returns `None` when the lengths differ. A zero-magnitude input scores 0.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot = x.mul_add(y, dot);
        norm_a = x.mul_add(x, norm_a);
        norm_b = y.mul_add(y, norm_b);
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return Some(0.0);
    }
    Some((dot / denominator).clamp(-1.0, 1.0) as f32)
}

fn issue(path: &Path, error: &VectorsError) -> ScanIssue {
    let kind = match error {
        VectorsError::Serialization(_) => ScanIssueKind::Malformed,
        _ => ScanIssueKind::Io,
    };
    ScanIssue {
        path: path.to_path_buf(),
        kind,
        message: error.to_string(),
    }
}
