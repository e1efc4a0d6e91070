use std::sync::Arc;
use crate::client::search_client::SearchClient;
use crate::core::error::Result;
use crate::core::types::Document;

/// Buffers documents for one index and sends them as `_bulk` chunks.
pub struct BulkBuffer {
    pub client: Arc<dyn SearchClient>,
    pub index: String,
    pub buffer: Vec<Document>,
    pub batch_size: usize,
    pub flushed: usize,
}

impl BulkBuffer {
    pub fn new(client: Arc<dyn SearchClient>, index: impl Into<String>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        BulkBuffer {
            client,
            index: index.into(),
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            flushed: 0,
        }
    }

    pub fn add(&mut self, doc: Document) -> Result<()> {
        self.buffer.push(doc);

        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk: Vec<Document> = self.buffer.drain(..).collect();
        self.client.create_entities(&self.index, &chunk)?;
        self.flushed += chunk.len();
        Ok(())
    }

    /// Flushes what is left and returns the number of documents sent.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.flushed)
    }
}
