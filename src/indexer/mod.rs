// Indexer module
// Embeds document chunks and hands them to the vector store


use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::embeddings::Embedder;
use crate::store::{
    DeleteOutcome, FileVectorStore, NewVectorRecord, RecordPayload, SearchReport,
};
use crate::{Result, VectorsError};

/// A piece of document text ready to be embedded
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: Map<String, Value>,
    /// Defaults to `"semantic"` when unset
    pub chunk_type: Option<String>,
}

impl DocumentChunk {
    #[inline]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_chunk_type(mut self, chunk_type: impl Into<String>) -> Self {
        self.chunk_type = Some(chunk_type.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Ingestion-side entry point: text in, stored vectors out
#[derive(Debug)]
pub struct DocumentIndexer<E> {
    store: FileVectorStore,
    embedder: E,
}

impl<E: Embedder> DocumentIndexer<E> {
    #[inline]
    pub fn new(store: FileVectorStore, embedder: E) -> Self {
        Self { store, embedder }
    }

    #[inline]
    pub fn store(&self) -> &FileVectorStore {
        &self.store
    }

    /// Embed and store every chunk of one document, replacing its previous version
    ///
    /// Returns the ids assigned to the stored records, in chunk order.
    #[inline]
    pub async fn index_document(
        &self,
        chunks: Vec<DocumentChunk>,
        course_id: &str,
        document_id: &str,
        course_name: Option<&str>,
    ) -> Result<Vec<String>> {
        if chunks.is_empty() {
            debug!("No chunks for document {}, nothing to index", document_id);
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(VectorsError::Embedding(format!(
                "Expected {} embeddings for document {}, got {}",
                chunks.len(),
                document_id,
                vectors.len()
            )));
        }

        let records = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(position, (chunk, vector))| {
                let chunk_index = u32::try_from(position).map_err(|_| {
                    VectorsError::Embedding(format!("Too many chunks in document {}", document_id))
                })?;
                let mut payload =
                    RecordPayload::new(course_id, document_id, chunk_index, chunk.content);
                payload.metadata = chunk.metadata;
                if let Some(chunk_type) = chunk.chunk_type {
                    payload.chunk_type = chunk_type;
                }
                Ok(NewVectorRecord {
                    id: Some(Uuid::new_v4().to_string()),
                    vector,
                    payload,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let ids = self
            .store
            .store(records, course_id, document_id, course_name)
            .await?;
        info!(
            "Indexed document {} of course {} as {} chunks",
            document_id,
            course_id,
            ids.len()
        );
        Ok(ids)
    }

    /// Embed `query` and rank the course's chunks against it
    #[inline]
    pub async fn search(
        &self,
        query: &str,
        course_id: &str,
        limit: usize,
        score_threshold: f32,
    ) -> Result<SearchReport> {
        let vector = self.embedder.embed(query).await?;
        Ok(self
            .store
            .search(&vector, course_id, limit, score_threshold)
            .await)
    }

    #[inline]
    pub async fn delete_document(&self, document_id: &str, course_id: &str) -> DeleteOutcome {
        self.store.delete_document(document_id, course_id).await
    }

    #[inline]
    pub async fn delete_course(&self, course_id: &str) -> DeleteOutcome {
        self.store.delete_course(course_id).await
    }
}
