use anyhow::Context;
use clap::{Args, ValueEnum};
use pdf_rag_core::gemini::DEFAULT_TEMPERATURE;
use pdf_rag_core::{
    CharacterNgramEmbedder, ChatModel, Embedder, GeminiChatModel, GeminiConfig, GeminiEmbedder,
    LocalStore, QdrantStore, VectorIndex, DEFAULT_GEMINI_BASE_URL,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingProvider {
    /// Gemini embedding API.
    Gemini,
    /// Offline character-trigram hashing.
    Ngram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VectorBackend {
    /// JSON collection file under the persist directory.
    Local,
    /// Qdrant REST API.
    Qdrant,
}

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// API key for the Gemini embedding and generation endpoints
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: String,

    /// Gemini API root
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    pub gemini_base_url: String,

    /// Which embedder turns text into vectors
    #[arg(long, env = "EMBEDDING_PROVIDER", value_enum, default_value_t = EmbeddingProvider::Gemini)]
    pub embedding_provider: EmbeddingProvider,

    /// Embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "models/gemini-embedding-001")]
    pub embedding_model: String,

    /// Primary chat model
    #[arg(long, env = "LLM_MODEL", default_value = "gemini-2.0-flash")]
    pub llm_model: String,

    /// Chat models tried in order when the previous one is rate limited
    #[arg(
        long,
        env = "LLM_FALLBACK_MODELS",
        value_delimiter = ',',
        default_value = "gemini-2.0-flash-lite,gemini-2.5-flash"
    )]
    pub llm_fallback_models: Vec<String>,

    /// Sampling temperature for answers
    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub llm_temperature: f32,

    /// Where chunks and their embeddings are kept
    #[arg(long, env = "VECTOR_BACKEND", value_enum, default_value_t = VectorBackend::Local)]
    pub vector_backend: VectorBackend,

    /// Directory for the local vector store
    #[arg(long, env = "VECTOR_PERSIST_DIR", default_value = "data/vector_db")]
    pub vector_persist_dir: PathBuf,

    /// Collection name in the vector store
    #[arg(long, env = "COLLECTION_NAME", default_value = "documents")]
    pub collection_name: String,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    pub qdrant_url: String,
}

impl Settings {
    fn gemini(&self) -> GeminiConfig {
        GeminiConfig::new(&self.gemini_base_url, &self.google_api_key)
    }

    pub fn embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        Ok(match self.embedding_provider {
            EmbeddingProvider::Gemini => Arc::new(
                GeminiEmbedder::new(&self.gemini(), &self.embedding_model)
                    .context("invalid Gemini base URL")?,
            ),
            EmbeddingProvider::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        })
    }

    pub async fn vector_index(&self) -> anyhow::Result<Arc<dyn VectorIndex>> {
        Ok(match self.vector_backend {
            VectorBackend::Local => Arc::new(
                LocalStore::open(&self.vector_persist_dir, &self.collection_name)
                    .await
                    .with_context(|| {
                        format!(
                            "failed to open vector store at {}",
                            self.vector_persist_dir.display()
                        )
                    })?,
            ),
            VectorBackend::Qdrant => {
                Arc::new(QdrantStore::new(&self.qdrant_url, &self.collection_name))
            }
        })
    }

    /// The primary model followed by the fallbacks, without repeats.
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in std::iter::once(&self.llm_model).chain(&self.llm_fallback_models) {
            let name = name.trim();
            if !name.is_empty() && !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    pub fn chat_models(&self) -> anyhow::Result<Vec<Arc<dyn ChatModel>>> {
        let gemini = self.gemini();
        self.model_names()
            .iter()
            .map(|name| {
                let model = GeminiChatModel::new(&gemini, name, self.llm_temperature)
                    .context("invalid Gemini base URL")?;
                Ok(Arc::new(model) as Arc<dyn ChatModel>)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServerSettings {
    /// Interface to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Prefix for the upload, search, and chat routes
    #[arg(long, env = "API_PREFIX", default_value = "/api/v1")]
    pub api_prefix: String,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 25 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl ServerSettings {
    pub fn address(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["test", "--google-api-key", "key"];
        argv.extend_from_slice(args);
        Harness::parse_from(argv).settings
    }

    #[test]
    fn fallback_list_is_comma_separated() {
        let settings = parse(&["--llm-fallback-models", "b,c"]);
        assert_eq!(settings.llm_fallback_models, vec!["b", "c"]);
    }

    #[test]
    fn model_names_put_primary_first_and_drop_repeats() {
        let settings = parse(&["--llm-model", "a", "--llm-fallback-models", "b,a, ,c"]);
        assert_eq!(settings.model_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn defaults_match_the_gemini_setup() {
        let settings = parse(&[]);
        assert_eq!(settings.embedding_model, "models/gemini-embedding-001");
        assert_eq!(settings.llm_model, "gemini-2.0-flash");
        assert_eq!(settings.vector_backend, VectorBackend::Local);
        assert_eq!(settings.chat_models().unwrap().len(), 3);
    }
}
