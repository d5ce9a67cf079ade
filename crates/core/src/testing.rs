//! Fixtures shared by this crate's tests and by downstream crates through the
//! `test-util` feature.

use crate::error::LlmError;
use crate::traits::ChatModel;
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Build an in-memory PDF with one page per entry. An empty entry produces a
/// page with no text operators, which is what an image-only scan looks like
/// to a text extractor.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations }
            .encode()
            .expect("content stream should encode");
        let content_id = document.add_object(Stream::new(dictionary! {}, content));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ],
    };
    document
        .objects
        .insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    document
        .save_to(&mut bytes)
        .expect("pdf should serialize");
    bytes
}

/// A chat model that replays a fixed script of outcomes and records every
/// invocation into a log shared with its siblings.
pub struct ScriptedChatModel {
    name: String,
    outcomes: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedChatModel {
    pub fn new(name: &str, calls: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            outcomes: Mutex::new(VecDeque::new()),
            calls,
        }
    }

    pub fn answering(self, text: &str) -> Self {
        self.push(Ok(text.to_string()))
    }

    pub fn rate_limited(self) -> Self {
        let error = LlmError::RateLimited {
            model: self.name.clone(),
            message: "429 RESOURCE_EXHAUSTED".to_string(),
        };
        self.push(Err(error))
    }

    pub fn failing(self, message: &str) -> Self {
        let error = LlmError::Failed {
            model: self.name.clone(),
            message: message.to_string(),
        };
        self.push(Err(error))
    }

    fn push(self, outcome: Result<String, LlmError>) -> Self {
        self.outcomes
            .lock()
            .expect("script lock poisoned")
            .push_back(outcome);
        self
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push(self.name.clone());
        self.outcomes
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::Failed {
                    model: self.name.clone(),
                    message: "script exhausted".to_string(),
                })
            })
    }
}
