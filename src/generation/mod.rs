//! Generation pipeline
//!
//! Turns a prompt into a validated, stub-repaired file set while streaming
//! each file out as soon as the model finishes writing it.

pub mod extractor;
pub mod import_resolver;
pub mod intent;
pub mod orchestrator;
pub mod parser;
pub mod stubs;
pub mod validator;

pub use extractor::StreamingExtractor;
pub use intent::{Intent, IntentClassifier};
pub use orchestrator::{GenerationError, GenerationRequest, GenerationStream, Orchestrator};
pub use parser::{parse, parse_response, ParsedResponse};
pub use stubs::{NamingClassifier, StubClassifier, StubRepairer};
pub use validator::validate;

use crate::config::{GenerationSettings, ModelSettings};
use crate::llm::{InvokeOptions, ModelInvoker};
use crate::templates::PromptEngine;
use std::sync::Arc;

/// Everything a generation run needs, shared across runs
pub struct GenerationContext {
    pub invoker: ModelInvoker,
    pub prompts: Arc<PromptEngine>,
    pub classifier: IntentClassifier,
    pub repairer: StubRepairer,
    pub settings: GenerationSettings,
    /// Default call options (model id, sampling, streaming)
    pub options: InvokeOptions,
}

impl GenerationContext {
    pub fn new(
        invoker: ModelInvoker,
        prompts: Arc<PromptEngine>,
        model: &ModelSettings,
        settings: GenerationSettings,
    ) -> Self {
        let classifier = match (&settings.generation_keywords, &settings.question_keywords) {
            (None, None) => IntentClassifier::default(),
            (generation, question) => {
                let generation = generation
                    .clone()
                    .unwrap_or_else(|| owned(intent::DEFAULT_GENERATION_KEYWORDS));
                let question = question
                    .clone()
                    .unwrap_or_else(|| owned(intent::DEFAULT_QUESTION_KEYWORDS));
                IntentClassifier::new(&generation, &question)
            }
        };

        Self {
            invoker,
            prompts,
            classifier,
            repairer: StubRepairer::new(),
            settings,
            options: InvokeOptions {
                model: model.model.clone(),
                temperature: model.temperature,
                max_tokens: model.max_tokens,
                stream: model.stream,
            },
        }
    }

    /// Swap the stub classifier
    pub fn with_stub_classifier(mut self, classifier: Box<dyn StubClassifier>) -> Self {
        self.repairer = StubRepairer::with_classifier(classifier);
        self
    }
}

fn owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| k.to_string()).collect()
}
