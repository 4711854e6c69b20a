// Clippy allows for reasonable defaults
// These suppress warnings that would require refactoring across many files
// or where the suggested change doesn't improve readability
#![allow(clippy::new_without_default)] // Default not always appropriate for stateful types
#![allow(clippy::derivable_impls)] // Explicit Default impls can be clearer
#![allow(clippy::field_reassign_with_default)] // Builder pattern is clearer
#![allow(clippy::unnecessary_map_or)] // map_or can be clearer than alternatives
#![allow(clippy::needless_borrow)] // Explicit borrows can clarify ownership
#![allow(clippy::useless_conversion)] // .into() can clarify type boundaries
#![allow(clippy::collapsible_if)] // Separate ifs can be more readable
#![allow(clippy::redundant_closure)] // |x| f(x) can be clearer than f
#![allow(clippy::needless_borrows_for_generic_args)] // Explicit borrows clarify intent
#![allow(clippy::len_without_is_empty)] // Counting helpers don't always need is_empty

// Module declarations
pub mod config;
pub mod events;
pub mod generation;
pub mod llm;
pub mod models;
pub mod sandbox;
pub mod session;
pub mod sync;
pub mod templates;
pub mod utils;

// Server module (HTTP/SSE API)
pub mod server;

// Re-export models for use by the binary and integration tests
pub use models::*;

use anyhow::{anyhow, Result};
use config::{resolve_api_key, LivegenConfig, SecretsConfig};
use generation::{GenerationContext, Orchestrator};
use llm::{HttpTransport, ModelInvoker, RetryPolicy};
use std::path::Path;
use std::sync::Arc;

/// Wire the model transport, retry policy and prompts into an orchestrator
pub fn build_orchestrator(config: &LivegenConfig, project_path: Option<&Path>) -> Result<Orchestrator> {
    let secrets = SecretsConfig::load().unwrap_or_else(|e| {
        log::warn!("Ignoring unreadable secrets file: {}", e);
        SecretsConfig::default()
    });
    let api_key = resolve_api_key(&config.model, &secrets);

    let transport = HttpTransport::from_settings(&config.model, api_key)
        .map_err(|e| anyhow!("Failed to set up model transport: {}", e))?;
    let invoker = ModelInvoker::new(
        Arc::new(transport),
        RetryPolicy::from_settings(&config.retry),
    );
    let prompts = templates::load_prompt_engine(project_path)?;

    log::info!(
        "Using model {} via {} ({} fallback model(s))",
        config.model.model,
        config.model.provider,
        config.retry.fallback_models.len()
    );

    let context = GenerationContext::new(
        invoker,
        Arc::new(prompts),
        &config.model,
        config.generation.clone(),
    );
    Ok(Orchestrator::new(Arc::new(context)))
}
