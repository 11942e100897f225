use super::*;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, text: &str) {
    fs::write(dir.path().join(CONFIG_FILE_NAME), text).expect("can write config file");
}

#[test]
fn relative_embeddings_dir_follows_config_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_config(
        &temp_dir,
        r#"
        [storage]
        embeddings_dir = "vectors"
        "#,
    );

    let config = Config::load(temp_dir.path()).expect("can load config");
    assert_eq!(config.storage_path(), temp_dir.path().join("vectors"));
}

#[test]
fn catalog_section_is_optional() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_config(
        &temp_dir,
        r#"
        [ollama]
        host = "embedder.lan"
        "#,
    );

    let config = Config::load(temp_dir.path()).expect("can load config");
    assert_eq!(config.catalog, CatalogConfig::default());
    assert_eq!(config.ollama.host, "embedder.lan");
    assert_eq!(config.ollama.port, OllamaConfig::default().port);
}

#[test]
fn broken_toml_names_the_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_config(&temp_dir, "[storage\ndefault_limit = 3");

    let error = Config::load(temp_dir.path()).expect_err("broken file is rejected");
    assert!(format!("{:#}", error).contains(CONFIG_FILE_NAME));
}

#[test]
fn wrong_value_type_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_config(
        &temp_dir,
        r#"
        [storage]
        default_limit = "many"
        "#,
    );

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn full_file_round_trips() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_config(
        &temp_dir,
        r#"
        [storage]
        embeddings_dir = "/srv/course-vectors"
        default_limit = 5
        score_threshold = 0.65

        [ollama]
        protocol = "https"
        host = "ollama.internal"
        port = 443
        model = "mxbai-embed-large"
        batch_size = 64
        embedding_dimension = 1024

        [catalog]
        database_path = "/var/lib/courses.db"
        "#,
    );

    let config = Config::load(temp_dir.path()).expect("can load config");
    assert_eq!(config.storage.default_limit, 5);
    assert_eq!(config.ollama.embedding_dimension, 1024);
    assert_eq!(
        config.catalog.database_path.as_deref(),
        Some(std::path::Path::new("/var/lib/courses.db"))
    );
    assert_eq!(config.storage_path(), std::path::Path::new("/srv/course-vectors"));

    config.save().expect("can save config");
    let reloaded = Config::load(temp_dir.path()).expect("can reload config");
    assert_eq!(reloaded, config);
}

#[test]
fn config_dir_is_named_after_crate() {
    if let Ok(dir) = get_config_dir() {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .expect("config dir has a name");
        assert!(name.contains("course-vectors"));
    }
}
