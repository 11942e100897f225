use super::*;
use tempfile::TempDir;

async fn create_catalog_database(temp_dir: &TempDir) -> std::path::PathBuf {
    let path = temp_dir.path().join("courses.db");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("can create database");

    sqlx::query("CREATE TABLE courses (id TEXT PRIMARY KEY, code TEXT NOT NULL, name TEXT NOT NULL)")
        .execute(&pool)
        .await
        .expect("can create table");
    sqlx::query("INSERT INTO courses (id, code, name) VALUES (?, ?, ?)")
        .bind("c-1")
        .bind("CS101")
        .bind("Intro to Rust")
        .execute(&pool)
        .await
        .expect("can insert course");
    pool.close().await;

    path
}

#[test]
fn directory_name_is_sanitized() {
    let info = CourseInfo::new("CS 101", "Intro: Rust & You");
    assert_eq!(info.directory_name(), "CS_101_Intro__Rust___You");
}

#[tokio::test]
async fn static_catalog_lookup() {
    let catalog = StaticCatalog::new().with_course("c-1", CourseInfo::new("CS101", "Intro"));

    assert_eq!(
        catalog.get_course("c-1").await.expect("can look up"),
        Some(CourseInfo::new("CS101", "Intro"))
    );
    assert_eq!(catalog.get_course("c-2").await.expect("can look up"), None);
}

#[tokio::test]
async fn sqlite_catalog_lookup() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = create_catalog_database(&temp_dir).await;

    let catalog = SqliteCatalog::connect(&path).await.expect("can open catalog");
    assert_eq!(
        catalog.get_course("c-1").await.expect("can look up"),
        Some(CourseInfo::new("CS101", "Intro to Rust"))
    );
    assert_eq!(catalog.get_course("missing").await.expect("can look up"), None);
}

#[tokio::test]
async fn sqlite_catalog_reports_missing_table() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("empty.db");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .expect("can create database")
        .close()
        .await;

    let catalog = SqliteCatalog::connect(&path).await.expect("can open catalog");
    assert!(matches!(
        catalog.get_course("c-1").await,
        Err(VectorsError::Catalog(_))
    ));
}
