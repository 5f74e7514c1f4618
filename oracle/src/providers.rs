//! Static provider metadata and per-service model defaults.
//!
//! Each provider carries one default model per [`ServiceKind`]. Temperature and
//! token limits are shared across providers and depend only on the service, so
//! the table stores models and reasoning settings and derives the rest.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row of [`provider_list`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// `None` when the user must supply a base URL.
    pub endpoint: Option<&'static str>,
    /// Environment variable for the key, when one is required.
    pub api_key_var: Option<String>,
    pub capabilities: Capabilities,
    pub narrative_model: &'static str,
    pub fallback_models: &'static [&'static str],
}

/// Every provider with its display metadata, in display order.
pub fn provider_list() -> Vec<ProviderSummary> {
    ProviderKind::ALL.iter().map(|kind| kind.summary()).collect()
}

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "nanogpt")]
    NanoGpt,
    Chutes,
    Pollinations,
    Ollama,
    #[serde(rename = "lmstudio")]
    LmStudio,
    #[serde(rename = "llamacpp")]
    LlamaCpp,
    NvidiaNim,
    OpenaiCompatible,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Google,
    #[serde(rename = "xai")]
    XAi,
    Groq,
    Zhipu,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Mistral,
}

impl ProviderKind {
    /// Every provider, in display order.
    pub const ALL: [ProviderKind; 17] = [
        ProviderKind::OpenRouter,
        ProviderKind::NanoGpt,
        ProviderKind::Chutes,
        ProviderKind::Pollinations,
        ProviderKind::Ollama,
        ProviderKind::LmStudio,
        ProviderKind::LlamaCpp,
        ProviderKind::NvidiaNim,
        ProviderKind::OpenaiCompatible,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Google,
        ProviderKind::XAi,
        ProviderKind::Groq,
        ProviderKind::Zhipu,
        ProviderKind::DeepSeek,
        ProviderKind::Mistral,
    ];

    /// Identifier used in settings files and environment variables.
    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::NanoGpt => "nanogpt",
            ProviderKind::Chutes => "chutes",
            ProviderKind::Pollinations => "pollinations",
            ProviderKind::Ollama => "ollama",
            ProviderKind::LmStudio => "lmstudio",
            ProviderKind::LlamaCpp => "llamacpp",
            ProviderKind::NvidiaNim => "nvidia-nim",
            ProviderKind::OpenaiCompatible => "openai-compatible",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::XAi => "xai",
            ProviderKind::Groq => "groq",
            ProviderKind::Zhipu => "zhipu",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Mistral => "mistral",
        }
    }

    /// Name of the environment variable holding this provider's API key.
    pub fn api_key_var(self) -> String {
        format!("{}_API_KEY", self.id().to_uppercase().replace('-', "_"))
    }

    /// Static configuration for this provider.
    pub fn config(self) -> &'static ProviderConfig {
        match self {
            ProviderKind::OpenRouter => &OPENROUTER,
            ProviderKind::NanoGpt => &NANOGPT,
            ProviderKind::Chutes => &CHUTES,
            ProviderKind::Pollinations => &POLLINATIONS,
            ProviderKind::Ollama => &OLLAMA,
            ProviderKind::LmStudio => &LMSTUDIO,
            ProviderKind::LlamaCpp => &LLAMACPP,
            ProviderKind::NvidiaNim => &NVIDIA_NIM,
            ProviderKind::OpenaiCompatible => &OPENAI_COMPATIBLE,
            ProviderKind::OpenAi => &OPENAI,
            ProviderKind::Anthropic => &ANTHROPIC,
            ProviderKind::Google => &GOOGLE,
            ProviderKind::XAi => &XAI,
            ProviderKind::Groq => &GROQ,
            ProviderKind::Zhipu => &ZHIPU,
            ProviderKind::DeepSeek => &DEEPSEEK,
            ProviderKind::Mistral => &MISTRAL,
        }
    }

    /// Base URL for chat completions, falling back to the vendor's
    /// OpenAI-compatible endpoint when the table leaves it to the SDK.
    ///
    /// Returns `None` only for providers that need a user-supplied URL.
    pub fn endpoint(self) -> Option<&'static str> {
        self.config().base_url.or(match self {
            ProviderKind::OpenAi => Some("https://api.openai.com/v1"),
            ProviderKind::Anthropic => Some("https://api.anthropic.com/v1"),
            ProviderKind::Google => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            _ => None,
        })
    }

    /// Whether this provider can be used without a custom base URL.
    pub fn has_default_endpoint(self) -> bool {
        self != ProviderKind::OpenaiCompatible
    }

    pub fn summary(self) -> ProviderSummary {
        let config = self.config();
        ProviderSummary {
            id: self.id(),
            name: config.name,
            description: config.description,
            endpoint: self.has_default_endpoint().then(|| self.endpoint()).flatten(),
            api_key_var: config.requires_api_key.then(|| self.api_key_var()),
            capabilities: config.capabilities,
            narrative_model: self.service_defaults(ServiceKind::Narrative).model,
            fallback_models: config.fallback_models,
        }
    }

    /// Model defaults for a given service.
    pub fn service_defaults(self, service: ServiceKind) -> ServiceDefaults {
        let config = self.config();
        let index = service.index();
        ServiceDefaults {
            model: config.service_models[index],
            temperature: service.default_temperature(),
            max_tokens: service.default_max_tokens(),
            reasoning_effort: config.service_reasoning[index],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|p| p.id() == needle)
            .ok_or_else(|| format!("unknown provider: {s}"))
    }
}

/// The kinds of work a model can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Narrative,
    Classification,
    Memory,
    Suggestions,
    Agentic,
    Wizard,
    Translation,
}

impl ServiceKind {
    fn index(self) -> usize {
        match self {
            ServiceKind::Narrative => 0,
            ServiceKind::Classification => 1,
            ServiceKind::Memory => 2,
            ServiceKind::Suggestions => 3,
            ServiceKind::Agentic => 4,
            ServiceKind::Wizard => 5,
            ServiceKind::Translation => 6,
        }
    }

    fn default_temperature(self) -> f32 {
        match self {
            ServiceKind::Narrative => 0.8,
            ServiceKind::Suggestions | ServiceKind::Wizard => 0.7,
            _ => 0.3,
        }
    }

    fn default_max_tokens(self) -> usize {
        match self {
            ServiceKind::Translation => 4096,
            _ => 8192,
        }
    }
}

/// How much hidden deliberation a reasoning model should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    #[default]
    Off,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Wire value, or `None` when reasoning is disabled.
    pub fn as_wire(self) -> Option<&'static str> {
        match self {
            ReasoningEffort::Off => None,
            ReasoningEffort::Low => Some("low"),
            ReasoningEffort::Medium => Some("medium"),
            ReasoningEffort::High => Some("high"),
        }
    }
}

/// Default generation parameters for one service on one provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceDefaults {
    pub model: &'static str,
    pub temperature: f32,
    pub max_tokens: usize,
    pub reasoning_effort: ReasoningEffort,
}

/// What a provider can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub text_generation: bool,
    pub image_generation: bool,
    pub structured_output: bool,
}

/// Static description of a provider.
#[derive(Debug)]
pub struct ProviderConfig {
    pub name: &'static str,
    pub description: &'static str,
    /// `None` means the vendor SDK default.
    pub base_url: Option<&'static str>,
    pub requires_api_key: bool,
    pub capabilities: Capabilities,
    pub fallback_models: &'static [&'static str],
    service_models: [&'static str; 7],
    service_reasoning: [ReasoningEffort; 7],
}

const OFF: [ReasoningEffort; 7] = [ReasoningEffort::Off; 7];

const fn caps(text: bool, image: bool, structured: bool) -> Capabilities {
    Capabilities {
        text_generation: text,
        image_generation: image,
        structured_output: structured,
    }
}

/// Same model for every service.
const fn uniform(model: &'static str) -> [&'static str; 7] {
    [model; 7]
}

/// One model for narrative/agentic work, another for the lighter services.
const fn split(heavy: &'static str, light: &'static str) -> [&'static str; 7] {
    [heavy, light, light, light, heavy, light, light]
}

static OPENROUTER: ProviderConfig = ProviderConfig {
    name: "OpenRouter",
    description: "Access 100+ models from one API",
    base_url: Some("https://openrouter.ai/api/v1"),
    requires_api_key: true,
    capabilities: caps(true, false, true),
    fallback_models: &[
        "anthropic/claude-sonnet-4",
        "openai/gpt-4o",
        "google/gemini-2.0-flash",
        "deepseek/deepseek-chat",
        "x-ai/grok-3",
    ],
    service_models: [
        "anthropic/claude-sonnet-4",
        "x-ai/grok-4.1-fast",
        "x-ai/grok-4.1-fast",
        "deepseek/deepseek-chat",
        "anthropic/claude-sonnet-4",
        "deepseek/deepseek-chat",
        "deepseek/deepseek-chat",
    ],
    service_reasoning: [
        ReasoningEffort::Off,
        ReasoningEffort::High,
        ReasoningEffort::High,
        ReasoningEffort::Off,
        ReasoningEffort::High,
        ReasoningEffort::Off,
        ReasoningEffort::Off,
    ],
};

static NANOGPT: ProviderConfig = ProviderConfig {
    name: "NanoGPT",
    description: "Subscription-Based LLMs and image generation",
    base_url: Some("https://nano-gpt.com/api/v1"),
    requires_api_key: true,
    capabilities: caps(true, true, false),
    fallback_models: &["deepseek-chat", "claude-sonnet-4", "gpt-4o", "gemini-2.0-flash"],
    service_models: [
        "zai-org/glm-4.7",
        "zai-org/glm-4.7",
        "deepseek-chat",
        "deepseek-chat",
        "deepseek-chat",
        "deepseek-chat",
        "deepseek-chat",
    ],
    service_reasoning: OFF,
};

static CHUTES: ProviderConfig = ProviderConfig {
    name: "Chutes",
    description: "Text and image generation",
    base_url: Some("https://api.chutes.ai"),
    requires_api_key: true,
    capabilities: caps(true, true, true),
    fallback_models: &[
        "deepseek-ai/DeepSeek-V3-0324",
        "meta-llama/Llama-4-Maverick-17B-128E-Instruct-FP8",
    ],
    service_models: uniform("deepseek-ai/DeepSeek-V3-0324"),
    service_reasoning: OFF,
};

static POLLINATIONS: ProviderConfig = ProviderConfig {
    name: "Pollinations",
    description: "Free text and image generation (no API key needed)",
    base_url: Some("https://text.pollinations.ai/openai"),
    requires_api_key: false,
    capabilities: caps(true, true, false),
    fallback_models: &["openai", "mistral", "llama"],
    service_models: uniform("openai"),
    service_reasoning: OFF,
};

static OLLAMA: ProviderConfig = ProviderConfig {
    name: "Ollama",
    description: "Run local LLMs (requires Ollama installed)",
    base_url: Some("http://localhost:11434"),
    requires_api_key: false,
    capabilities: caps(true, false, true),
    fallback_models: &["llama3.2", "llama3.1", "mistral", "codellama", "qwen2.5", "phi3", "gemma2"],
    service_models: uniform("llama3.2"),
    service_reasoning: OFF,
};

static LMSTUDIO: ProviderConfig = ProviderConfig {
    name: "LM Studio",
    description: "Run local LLMs (requires LM Studio installed)",
    base_url: Some("http://localhost:1234/v1"),
    requires_api_key: false,
    capabilities: caps(true, false, false),
    fallback_models: &["loaded-model"],
    service_models: uniform("loaded-model"),
    service_reasoning: OFF,
};

static LLAMACPP: ProviderConfig = ProviderConfig {
    name: "llama.cpp",
    description: "Run local LLMs (requires llama.cpp server)",
    base_url: Some("http://localhost:8080/v1"),
    requires_api_key: false,
    capabilities: caps(true, false, false),
    fallback_models: &["loaded-model"],
    service_models: uniform("loaded-model"),
    service_reasoning: OFF,
};

static NVIDIA_NIM: ProviderConfig = ProviderConfig {
    name: "NVIDIA NIM",
    description: "NVIDIA hosted inference microservices",
    base_url: Some("https://integrate.api.nvidia.com/v1"),
    requires_api_key: true,
    capabilities: caps(true, false, true),
    fallback_models: &[
        "meta/llama-3.1-70b-instruct",
        "meta/llama-3.1-8b-instruct",
        "nvidia/llama-3.1-nemotron-70b-instruct",
    ],
    service_models: split("meta/llama-3.1-70b-instruct", "meta/llama-3.1-8b-instruct"),
    service_reasoning: OFF,
};

static OPENAI_COMPATIBLE: ProviderConfig = ProviderConfig {
    name: "OpenAI Compatible",
    description: "Any OpenAI-compatible API (requires custom URL)",
    base_url: None,
    requires_api_key: false,
    capabilities: caps(true, false, false),
    fallback_models: &["default"],
    service_models: uniform("default"),
    service_reasoning: OFF,
};

static OPENAI: ProviderConfig = ProviderConfig {
    name: "OpenAI",
    description: "GPT models from OpenAI",
    base_url: None,
    requires_api_key: true,
    capabilities: caps(true, true, true),
    fallback_models: &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo", "o1", "o1-mini"],
    service_models: split("gpt-4o", "gpt-4o-mini"),
    service_reasoning: OFF,
};

static ANTHROPIC: ProviderConfig = ProviderConfig {
    name: "Anthropic",
    description: "Claude models",
    base_url: None,
    requires_api_key: true,
    capabilities: caps(true, false, true),
    fallback_models: &[
        "claude-opus-4-5-20251101",
        "claude-haiku-4-5-20251001",
        "claude-sonnet-4-5-20250929",
        "claude-opus-4-1-20250805",
        "claude-sonnet-4-20250514",
        "claude-opus-4-20250514",
    ],
    service_models: split("claude-sonnet-4-20250514", "claude-haiku-4-20250514"),
    service_reasoning: OFF,
};

static GOOGLE: ProviderConfig = ProviderConfig {
    name: "Google AI",
    description: "Gemini models",
    base_url: None,
    requires_api_key: true,
    capabilities: caps(true, true, true),
    fallback_models: &[
        "gemini-3-pro-preview",
        "gemini-3-flash-preview",
        "gemini-2.5-pro",
        "gemini-2.5-flash",
        "gemini-2.5-flash-lite",
    ],
    service_models: uniform("gemini-2.0-flash"),
    service_reasoning: OFF,
};

static XAI: ProviderConfig = ProviderConfig {
    name: "xAI (Grok)",
    description: "Grok models from xAI",
    base_url: Some("https://api.x.ai/v1"),
    requires_api_key: true,
    capabilities: caps(true, false, true),
    fallback_models: &["grok-3", "grok-3-fast", "grok-2", "grok-2-vision"],
    service_models: split("grok-3", "grok-3-fast"),
    service_reasoning: OFF,
};

static GROQ: ProviderConfig = ProviderConfig {
    name: "Groq",
    description: "Ultra-fast inference for open models",
    base_url: Some("https://api.groq.com/openai/v1"),
    requires_api_key: true,
    capabilities: caps(true, false, true),
    fallback_models: &[
        "llama-3.3-70b-versatile",
        "llama-3.1-8b-instant",
        "mixtral-8x7b-32768",
        "gemma2-9b-it",
    ],
    service_models: split("llama-3.3-70b-versatile", "llama-3.1-8b-instant"),
    service_reasoning: OFF,
};

static ZHIPU: ProviderConfig = ProviderConfig {
    name: "Zhipu AI",
    description: "GLM models (Chinese AI provider)",
    base_url: Some("https://open.bigmodel.cn/api/paas/v4"),
    requires_api_key: true,
    capabilities: caps(true, true, true),
    fallback_models: &["glm-4-plus", "glm-4-flash", "glm-4-air", "glm-4v", "glm-4v-plus", "cogview-3-plus"],
    service_models: split("glm-4-plus", "glm-4-flash"),
    service_reasoning: OFF,
};

static DEEPSEEK: ProviderConfig = ProviderConfig {
    name: "DeepSeek",
    description: "Cost-effective reasoning models",
    base_url: Some("https://api.deepseek.com/v1"),
    requires_api_key: true,
    capabilities: caps(true, false, true),
    fallback_models: &["deepseek-chat", "deepseek-reasoner"],
    service_models: uniform("deepseek-chat"),
    service_reasoning: OFF,
};

static MISTRAL: ProviderConfig = ProviderConfig {
    name: "Mistral",
    description: "European AI provider with strong coding models",
    base_url: Some("https://api.mistral.ai/v1"),
    requires_api_key: true,
    capabilities: caps(true, false, true),
    fallback_models: &[
        "mistral-large-latest",
        "mistral-small-latest",
        "codestral-latest",
        "pixtral-large-latest",
        "ministral-8b-latest",
        "ministral-3b-latest",
    ],
    service_models: split("mistral-large-latest", "mistral-small-latest"),
    service_reasoning: OFF,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_ids_round_trip() {
        for provider in ProviderKind::ALL {
            assert_eq!(provider.id().parse::<ProviderKind>(), Ok(provider));
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider.id()));
        }
    }

    #[test]
    fn test_unknown_provider() {
        assert!("skynet".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_service_defaults() {
        let d = ProviderKind::OpenRouter.service_defaults(ServiceKind::Suggestions);
        assert_eq!(d.model, "deepseek/deepseek-chat");
        assert_eq!(d.temperature, 0.7);
        assert_eq!(d.max_tokens, 8192);
        assert_eq!(d.reasoning_effort, ReasoningEffort::Off);

        let d = ProviderKind::OpenRouter.service_defaults(ServiceKind::Classification);
        assert_eq!(d.reasoning_effort, ReasoningEffort::High);

        let d = ProviderKind::OpenAi.service_defaults(ServiceKind::Translation);
        assert_eq!(d.model, "gpt-4o-mini");
        assert_eq!(d.max_tokens, 4096);
        assert_eq!(d.temperature, 0.3);

        let d = ProviderKind::Groq.service_defaults(ServiceKind::Narrative);
        assert_eq!(d.model, "llama-3.3-70b-versatile");
        assert_eq!(d.temperature, 0.8);
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(ProviderKind::OpenRouter.endpoint(), Some("https://openrouter.ai/api/v1"));
        assert_eq!(ProviderKind::OpenAi.endpoint(), Some("https://api.openai.com/v1"));
        assert_eq!(ProviderKind::OpenaiCompatible.endpoint(), None);
        assert!(!ProviderKind::OpenaiCompatible.has_default_endpoint());
        assert!(ProviderKind::Ollama.has_default_endpoint());
    }

    #[test]
    fn test_provider_list() {
        let list = provider_list();
        assert_eq!(list.len(), ProviderKind::ALL.len());

        let openrouter = &list[0];
        assert_eq!(openrouter.id, "openrouter");
        assert_eq!(openrouter.name, "OpenRouter");
        assert_eq!(openrouter.endpoint, Some("https://openrouter.ai/api/v1"));
        assert_eq!(openrouter.api_key_var.as_deref(), Some("OPENROUTER_API_KEY"));
        assert!(openrouter.capabilities.structured_output);
        assert!(openrouter.fallback_models.contains(&"openai/gpt-4o"));

        let custom = ProviderKind::OpenaiCompatible.summary();
        assert_eq!(custom.endpoint, None);
    }

    #[test]
    fn test_api_key_var() {
        assert_eq!(ProviderKind::NvidiaNim.api_key_var(), "NVIDIA_NIM_API_KEY");
        assert_eq!(ProviderKind::OpenRouter.api_key_var(), "OPENROUTER_API_KEY");
    }
}
