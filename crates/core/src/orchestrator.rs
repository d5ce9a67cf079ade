use crate::error::{GenerationError, LlmError};
use crate::models::{Answer, RetrievedChunk, SourceExcerpt};
use crate::store::VectorStore;
use crate::traits::ChatModel;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const NO_DOCUMENTS_ANSWER: &str =
    "I couldn't find any relevant documents to answer your question.";
pub const PREVIEW_CHARS: usize = 200;

/// Retrieves context for a question and asks the configured chat models for
/// an answer, moving down the model list only on rate limits.
pub struct AnswerGenerator {
    store: VectorStore,
    models: Vec<Arc<dyn ChatModel>>,
}

impl AnswerGenerator {
    /// `models` is tried in order: the primary model first, then fallbacks.
    pub fn new(store: VectorStore, models: Vec<Arc<dyn ChatModel>>) -> Self {
        let names = models.iter().map(|model| model.name()).collect::<Vec<_>>();
        info!(models = ?names, "answer generator ready");
        Self { store, models }
    }

    pub async fn answer(&self, query: &str, k: usize) -> Result<Answer, GenerationError> {
        info!(query = %query, k, "rag query");

        let candidates = self.store.search(query, k).await?;
        if candidates.is_empty() {
            return Ok(Answer {
                answer: NO_DOCUMENTS_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let unique = deduplicate(candidates);
        let prompt = build_prompt(&format_context(&unique), query);
        let answer = self.generate_with_fallback(&prompt).await?;

        Ok(Answer {
            answer,
            sources: unique.iter().map(source_excerpt).collect(),
        })
    }

    async fn generate_with_fallback(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut last_error: Option<LlmError> = None;

        for model in &self.models {
            info!(model = model.name(), "invoking model");
            match model.generate(prompt).await {
                Ok(answer) => {
                    info!(model = model.name(), "answer generated");
                    return Ok(answer);
                }
                Err(err) if err.is_rate_limited() => {
                    warn!(model = model.name(), error = %err, "model rate limited, falling back");
                    last_error = Some(err);
                }
                Err(err) => {
                    error!(model = model.name(), error = %err, "llm error");
                    return Err(err.into());
                }
            }
        }

        match last_error {
            Some(err) => {
                error!(error = %err, "all models exhausted");
                Err(err.into())
            }
            None => Err(GenerationError::NoModels),
        }
    }
}

/// Drop chunks whose text repeats an earlier chunk, keeping first occurrences
/// in their original order.
pub fn deduplicate(chunks: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .filter(|chunk| seen.insert(chunk.text.clone()))
        .collect()
}

pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful and professional assistant that answers questions about the user's documents.

Answer the question based ONLY on the following context.
If the answer is not in the context, strictly say \"I don't have enough information to answer that.\"
Do not make up facts.

Context:
{context}

Question:
{question}
"
    )
}

fn source_excerpt(chunk: &RetrievedChunk) -> SourceExcerpt {
    let preview = chunk.text.chars().take(PREVIEW_CHARS).collect::<String>();
    SourceExcerpt {
        source: chunk.source_or_unknown().to_string(),
        content: format!("{preview}..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::Chunk;
    use crate::stores::LocalStore;
    use crate::testing::ScriptedChatModel;
    use std::sync::Mutex;

    fn retrieved(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            source: Some("a.pdf".to_string()),
            score: 1.0,
        }
    }

    fn texts(chunks: &[RetrievedChunk]) -> Vec<&str> {
        chunks.iter().map(|chunk| chunk.text.as_str()).collect()
    }

    async fn seeded_store(chunks: &[Chunk]) -> VectorStore {
        let store = VectorStore::new(
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(LocalStore::in_memory()),
        );
        store.add(chunks).await.unwrap();
        store
    }

    fn model(scripted: ScriptedChatModel) -> Arc<dyn ChatModel> {
        Arc::new(scripted)
    }

    fn call_log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn calls(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn deduplicate_keeps_first_occurrence_order() {
        let input = vec![
            retrieved("b"),
            retrieved("a"),
            retrieved("b"),
            retrieved("c"),
            retrieved("a"),
        ];

        let once = deduplicate(input);
        assert_eq!(texts(&once), vec!["b", "a", "c"]);

        let twice = deduplicate(once.clone());
        assert_eq!(twice, once);
    }

    #[test]
    fn context_is_joined_with_blank_lines() {
        let context = format_context(&[retrieved("one"), retrieved("two")]);
        assert_eq!(context, "one\n\ntwo");
    }

    #[test]
    fn prompt_contains_context_and_question() {
        let prompt = build_prompt("Orders ship in two days.", "When do orders ship?");
        assert!(prompt.contains("Context:\nOrders ship in two days."));
        assert!(prompt.contains("Question:\nWhen do orders ship?"));
        assert!(prompt.contains("I don't have enough information to answer that."));
    }

    #[test]
    fn excerpt_is_truncated_with_marker() {
        let long = "x".repeat(450);
        let excerpt = source_excerpt(&retrieved(&long));
        assert_eq!(excerpt.content.chars().count(), PREVIEW_CHARS + 3);
        assert!(excerpt.content.ends_with("..."));

        let unnamed = RetrievedChunk {
            text: "short".to_string(),
            source: None,
            score: 0.0,
        };
        let excerpt = source_excerpt(&unnamed);
        assert_eq!(excerpt.source, "unknown");
        assert_eq!(excerpt.content, "short...");
    }

    #[tokio::test]
    async fn empty_store_returns_fixed_answer_without_calling_models() {
        let log = call_log();
        let store = seeded_store(&[]).await;
        let generator = AnswerGenerator::new(
            store,
            vec![model(ScriptedChatModel::new("A", log.clone()).answering("unused"))],
        );

        let answer = generator.answer("anything?", 3).await.unwrap();

        assert_eq!(answer.answer, NO_DOCUMENTS_ANSWER);
        assert!(answer.sources.is_empty());
        assert!(calls(&log).is_empty());
    }

    #[tokio::test]
    async fn falls_back_across_rate_limited_models_in_order() {
        let log = call_log();
        let store =
            seeded_store(&[Chunk::new("Returns are accepted for 30 days.", "policy.pdf")]).await;
        let generator = AnswerGenerator::new(
            store,
            vec![
                model(ScriptedChatModel::new("A", log.clone()).rate_limited()),
                model(ScriptedChatModel::new("B", log.clone()).rate_limited()),
                model(ScriptedChatModel::new("C", log.clone()).answering("30 days.")),
            ],
        );

        let answer = generator.answer("How long do I have to return?", 3).await.unwrap();

        assert_eq!(answer.answer, "30 days.");
        assert_eq!(calls(&log), vec!["A", "B", "C"]);
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].source, "policy.pdf");
        assert_eq!(answer.sources[0].content, "Returns are accepted for 30 days....");
    }

    #[tokio::test]
    async fn fatal_error_stops_without_trying_fallbacks() {
        let log = call_log();
        let store = seeded_store(&[Chunk::new("Some context.", "a.pdf")]).await;
        let generator = AnswerGenerator::new(
            store,
            vec![
                model(ScriptedChatModel::new("A", log.clone()).failing("invalid api key")),
                model(ScriptedChatModel::new("B", log.clone()).answering("unused")),
                model(ScriptedChatModel::new("C", log.clone()).answering("unused")),
            ],
        );

        let error = generator.answer("question", 3).await.unwrap_err();

        assert!(matches!(
            error,
            GenerationError::Model(LlmError::Failed { ref model, .. }) if model == "A"
        ));
        assert_eq!(calls(&log), vec!["A"]);
    }

    #[tokio::test]
    async fn exhausted_models_surface_last_rate_limit() {
        let log = call_log();
        let store = seeded_store(&[Chunk::new("Some context.", "a.pdf")]).await;
        let generator = AnswerGenerator::new(
            store,
            vec![
                model(ScriptedChatModel::new("A", log.clone()).rate_limited()),
                model(ScriptedChatModel::new("B", log.clone()).rate_limited()),
            ],
        );

        let error = generator.answer("question", 3).await.unwrap_err();

        assert!(matches!(
            error,
            GenerationError::Model(LlmError::RateLimited { ref model, .. }) if model == "B"
        ));
        assert_eq!(calls(&log), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn duplicate_chunks_produce_one_source() {
        let log = call_log();
        let store = seeded_store(&[
            Chunk::new("Same paragraph.", "a.pdf"),
            Chunk::new("Same paragraph.", "b.pdf"),
        ])
        .await;
        let generator = AnswerGenerator::new(
            store,
            vec![model(ScriptedChatModel::new("A", log.clone()).answering("ok"))],
        );

        let answer = generator.answer("Same paragraph", 2).await.unwrap();

        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].source, "a.pdf");
    }

    #[tokio::test]
    async fn no_models_is_an_error() {
        let store = seeded_store(&[Chunk::new("Some context.", "a.pdf")]).await;
        let generator = AnswerGenerator::new(store, Vec::new());

        let error = generator.answer("question", 3).await.unwrap_err();

        assert!(matches!(error, GenerationError::NoModels));
    }
}
