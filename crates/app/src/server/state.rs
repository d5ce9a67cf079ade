use pdf_rag_core::{AnswerGenerator, DocumentProcessor, VectorStore};
use std::sync::Arc;

/// Components shared by every handler. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<DocumentProcessor>,
    pub store: Arc<VectorStore>,
    pub generator: Arc<AnswerGenerator>,
}

impl AppState {
    pub fn new(
        processor: DocumentProcessor,
        store: VectorStore,
        generator: AnswerGenerator,
    ) -> Self {
        Self {
            processor: Arc::new(processor),
            store: Arc::new(store),
            generator: Arc::new(generator),
        }
    }
}
