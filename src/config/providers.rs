// Builtin presets for OpenAI-compatible chat completion providers

/// A builtin provider preset
/// Note: This is hardcoded data, not deserialized from files
#[derive(Debug, Clone)]
pub struct ProviderPreset {
    /// Provider ID, also the token key in the secrets file
    pub id: &'static str,
    pub name: &'static str,
    /// Base URL; requests go to `{base_url}/chat/completions`
    pub base_url: &'static str,
    /// Environment variable conventionally holding the key
    pub api_key_env: &'static str,
    /// Local servers accept unauthenticated requests
    pub requires_key: bool,
    pub default_model: &'static str,
}

pub static PROVIDERS: &[ProviderPreset] = &[
    ProviderPreset {
        id: "openai",
        name: "OpenAI",
        base_url: "https://api.openai.com/v1",
        api_key_env: "OPENAI_API_KEY",
        requires_key: true,
        default_model: "gpt-4o-mini",
    },
    ProviderPreset {
        id: "openrouter",
        name: "OpenRouter",
        base_url: "https://openrouter.ai/api/v1",
        api_key_env: "OPENROUTER_API_KEY",
        requires_key: true,
        default_model: "openai/gpt-4o-mini",
    },
    ProviderPreset {
        id: "groq",
        name: "Groq",
        base_url: "https://api.groq.com/openai/v1",
        api_key_env: "GROQ_API_KEY",
        requires_key: true,
        default_model: "llama-3.3-70b-versatile",
    },
    ProviderPreset {
        id: "ollama",
        name: "Ollama (local)",
        base_url: "http://localhost:11434/v1",
        api_key_env: "OLLAMA_API_KEY",
        requires_key: false,
        default_model: "qwen2.5-coder",
    },
];

/// Get a provider preset by ID
pub fn get_provider(id: &str) -> Option<&'static ProviderPreset> {
    PROVIDERS.iter().find(|p| p.id == id)
}
