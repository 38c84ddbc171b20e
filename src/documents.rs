//! Off-chain document content storage
use parking_lot::RwLock;
use std::collections::HashMap;

/// Content store keyed by document id. Integrity hashing is done by the
/// caller; the store only keeps bytes.
pub trait DocumentStore: Send + Sync {
    fn store(&self, document_id: &str, content: &[u8]) -> anyhow::Result<()>;
    fn fetch(&self, document_id: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn exists(&self, document_id: &str) -> anyhow::Result<bool>;
}

pub struct SledDocumentStore {
    documents: sled::Tree,
}

impl SledDocumentStore {
    pub fn new(instance: &sled::Db) -> anyhow::Result<Self> {
        Ok(Self {
            documents: instance.open_tree("documents")?,
        })
    }
}

impl DocumentStore for SledDocumentStore {
    fn store(&self, document_id: &str, content: &[u8]) -> anyhow::Result<()> {
        self.documents.insert(document_id.as_bytes(), content)?;
        tracing::debug!(%document_id, bytes = content.len(), "document stored");
        Ok(())
    }

    fn fetch(&self, document_id: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self
            .documents
            .get(document_id.as_bytes())?
            .map(|bytes| bytes.to_vec()))
    }

    fn exists(&self, document_id: &str) -> anyhow::Result<bool> {
        Ok(self.documents.contains_key(document_id.as_bytes())?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn store(&self, document_id: &str, content: &[u8]) -> anyhow::Result<()> {
        self.documents
            .write()
            .insert(document_id.to_string(), content.to_vec());
        Ok(())
    }

    fn fetch(&self, document_id: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.documents.read().get(document_id).cloned())
    }

    fn exists(&self, document_id: &str) -> anyhow::Result<bool> {
        Ok(self.documents.read().contains_key(document_id))
    }
}
