pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod stores;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod traits;

pub use chunking::{split_text, ChunkingConfig, DEFAULT_SEPARATORS};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{GenerationError, IngestError, LlmError, SearchError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use gemini::{GeminiChatModel, GeminiConfig, GeminiEmbedder, DEFAULT_GEMINI_BASE_URL};
pub use ingest::{
    discover_pdf_files, ingest_path, load_local_file, DocumentProcessor, IngestionReport,
    SkippedPdf, PDF_CONTENT_TYPE,
};
pub use models::{
    Answer, Chunk, DocumentRecord, IngestionOptions, RetrievedChunk, SourceExcerpt, UploadedFile,
};
pub use orchestrator::{AnswerGenerator, NO_DOCUMENTS_ANSWER};
pub use store::VectorStore;
pub use stores::{LocalStore, QdrantStore};
pub use traits::{ChatModel, VectorIndex};
