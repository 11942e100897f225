use anyhow::{Context, Result};
use tracing::{error, info};

use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::store::{DeleteOutcome, FileVectorStore};

async fn open_store(config: &Config) -> Result<FileVectorStore> {
    FileVectorStore::from_config(config)
        .await
        .with_context(|| {
            format!(
                "Failed to open vector store at {}",
                config.storage_path().display()
            )
        })
}

/// Copy legacy id-named course directories into name-based ones
#[inline]
pub async fn migrate(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    if config.catalog.database_path.is_none() {
        println!("No catalog database configured; legacy directories cannot be named.");
    }

    info!("Starting migration of {}", store.root().display());
    let report = store.migrate_all().await;

    println!("Migration completed:");
    println!("  Migrated: {}", report.migrated);
    println!("  Skipped: {}", report.skipped);
    println!("  Errors: {}", report.errors);
    println!("  Files copied: {}", report.files_copied);
    for failure in &report.failures {
        println!("  ⚠️  {}", failure);
    }

    if report.errors > 0 {
        return Err(anyhow::anyhow!(
            "Migration finished with {} errors",
            report.errors
        ));
    }
    Ok(())
}

/// Wipe every course directory
#[inline]
pub async fn reinitialize(config: &Config, confirmed: bool) -> Result<()> {
    let store = open_store(config).await?;

    if !confirmed {
        println!(
            "This deletes every stored vector under {}.",
            store.root().display()
        );
        println!("Re-run with --yes to proceed.");
        return Ok(());
    }

    let report = store.reinitialize().await;
    println!(
        "Removed {} files in {} course directories",
        report.files_removed, report.directories_removed
    );

    if !report.succeeded() {
        for failure in &report.failures {
            error!("Reinitialize failure: {}", failure);
            println!("  ⚠️  {}", failure);
        }
        return Err(anyhow::anyhow!(
            "Reinitialize left {} failures behind",
            report.failures.len()
        ));
    }

    let remaining = store.list_courses().await?.len();
    println!("Embeddings storage reinitialized ({} courses remain)", remaining);
    Ok(())
}

/// Print every course directory and its contents
#[inline]
pub async fn list_courses(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let courses = store.list_courses().await?;

    if courses.is_empty() {
        println!("No courses stored under {}", store.root().display());
        return Ok(());
    }

    println!("Stored courses:");
    println!();
    for course in &courses {
        let binding = match &course.marker {
            Some(marker) => format!("bound to {}", marker.id),
            None => "legacy, no marker".to_string(),
        };
        println!("📚 {} ({})", course.name, binding);
        println!("   Course ID: {}", course.course_id());
        println!("   Documents: {}", course.documents);
        println!();
    }

    let stats = store.stats().await?;
    println!("Summary:");
    println!("  Courses: {}", stats.courses);
    println!("  Documents: {}", stats.documents);
    println!("  Vectors: {}", stats.vectors);
    if stats.malformed_files > 0 {
        println!("  Malformed files: {}", stats.malformed_files);
    }

    Ok(())
}

/// Remove a course's vectors
#[inline]
pub async fn delete_course(config: &Config, course_id: &str) -> Result<()> {
    let store = open_store(config).await?;
    match store.delete_course(course_id).await {
        DeleteOutcome::Removed { files } => {
            println!("Deleted {} documents of course {}", files, course_id);
            Ok(())
        }
        DeleteOutcome::NotFound => {
            println!("No vectors stored for course {}", course_id);
            Ok(())
        }
        DeleteOutcome::Failed { reason } => {
            Err(anyhow::anyhow!("Failed to delete course {}: {}", course_id, reason))
        }
    }
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    println!("📋 Current Configuration");
    println!();

    println!("Storage Settings:");
    println!("  Embeddings directory: {}", config.storage_path().display());
    println!("  Default limit: {}", config.storage.default_limit);
    println!("  Score threshold: {}", config.storage.score_threshold);

    println!();
    println!("Ollama Settings:");
    println!("  Host: {}", config.ollama.host);
    println!("  Port: {}", config.ollama.port);
    println!("  Model: {}", config.ollama.model);
    println!("  Batch Size: {}", config.ollama.batch_size);
    match config.ollama_url() {
        Ok(url) => println!("  Ollama URL: {}", url),
        Err(e) => println!("  Ollama URL: Invalid ({})", e),
    }

    println!();
    match &config.catalog.database_path {
        Some(path) => println!("Catalog database: {}", path.display()),
        None => println!("Catalog database: not configured"),
    }

    println!();
    println!("Config file: {}", config.config_file_path().display());
    Ok(())
}

/// Write the current configuration to disk so it can be edited by hand
#[inline]
pub fn write_config(config: &Config) -> Result<()> {
    config.save()?;
    println!("Configuration saved to {}", config.config_file_path().display());
    Ok(())
}

/// Report on the embedding server and the stored vectors
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Course Vectors Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    let health = OllamaClient::new(&config.ollama).and_then(|client| client.health_check());
    match health {
        Ok(()) => {
            println!(
                "   ✅ Ollama: Connected ({}:{})",
                config.ollama.host, config.ollama.port
            );
            println!("   📋 Model: {}", config.ollama.model);
        }
        Err(e) => println!("   ❌ Ollama: {:#}", e),
    }

    println!();
    println!("🔍 Vector Storage Status:");
    match open_store(config).await {
        Ok(store) => match store.stats().await {
            Ok(stats) => {
                println!("   ✅ Storage: {}", store.root().display());
                println!("   Courses: {}", stats.courses);
                println!("   Documents: {}", stats.documents);
                println!("   Vectors: {}", stats.vectors);
                if stats.malformed_files > 0 {
                    println!("   ⚠️  Malformed files: {}", stats.malformed_files);
                }
            }
            Err(e) => println!("   ❌ Storage scan failed: {}", e),
        },
        Err(e) => println!("   ❌ Storage: {:#}", e),
    }

    Ok(())
}
