// Course catalog module
// Read-only access to the authoritative course metadata, used to name directories

#[cfg(test)]
mod tests;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::store::sanitize_directory_name;
use crate::{Result, VectorsError};

/// Course metadata as kept by the relational database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CourseInfo {
    pub code: String,
    pub name: String,
}

impl CourseInfo {
    #[inline]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Filesystem-safe `"{code}_{name}"`
    #[inline]
    pub fn directory_name(&self) -> String {
        sanitize_directory_name(&format!("{}_{}", self.code, self.name))
    }
}

/// Lookup of course metadata by course id
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn get_course(&self, course_id: &str) -> Result<Option<CourseInfo>>;
}

/// Catalog held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    courses: HashMap<String, CourseInfo>,
}

impl StaticCatalog {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_course(mut self, course_id: impl Into<String>, info: CourseInfo) -> Self {
        self.courses.insert(course_id.into(), info);
        self
    }
}

#[async_trait]
impl CourseCatalog for StaticCatalog {
    #[inline]
    async fn get_course(&self, course_id: &str) -> Result<Option<CourseInfo>> {
        Ok(self.courses.get(course_id).cloned())
    }
}

/// Catalog backed by the `courses` table of a SQLite database, opened read-only
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    #[inline]
    pub async fn connect<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();
        debug!("Opening course catalog at {:?}", path);

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open course catalog: {}", path.display()))?;

        info!("Course catalog opened at {:?}", path);
        Ok(Self { pool })
    }

    #[inline]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseCatalog for SqliteCatalog {
    #[inline]
    async fn get_course(&self, course_id: &str) -> Result<Option<CourseInfo>> {
        sqlx::query_as::<_, CourseInfo>("SELECT code, name FROM courses WHERE id = ?")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VectorsError::Catalog(format!("Failed to look up course {}: {}", course_id, e)))
    }
}
