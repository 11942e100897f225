use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorsError>;

#[derive(Error, Debug)]
pub enum VectorsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Invalid course id: {0:?}")]
    InvalidCourseId(String),

    #[error("Invalid document id: {0:?}")]
    InvalidDocumentId(String),

    #[error(
        "Record {record} belongs to {found_course}/{found_document}, expected {expected_course}/{expected_document}"
    )]
    PayloadMismatch {
        record: usize,
        expected_course: String,
        expected_document: String,
        found_course: String,
        found_document: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod catalog;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod indexer;
pub mod store;
