use crate::error::{GaitError, Result};

pub const DEFAULT_INDEX: &str = "runners-index";
pub const DEFAULT_CONTROLLER_URL: &str = "https://api.pinecone.io";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Clone, Debug)]
pub struct PineconeConfig {
    pub api_key: String,
    pub index: String,
    /// Data-plane host; looked up through the controller when absent.
    pub host: Option<String>,
    pub controller_url: String,
}

/// Which text-generation backend answers `generate_analysis`.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderConfig {
    OpenAi { api_key: String, model: String },
    Gemini { api_key: String, model: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub pinecone: PineconeConfig,
    pub provider: Option<ProviderConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = var("PINECONE_API_KEY").ok_or_else(|| {
            GaitError::Configuration("PINECONE_API_KEY is not set".to_string())
        })?;
        let pinecone = PineconeConfig {
            api_key,
            index: var("PINECONE_INDEX").unwrap_or_else(|| DEFAULT_INDEX.to_string()),
            host: var("PINECONE_HOST"),
            controller_url: var("PINECONE_CONTROLLER_URL")
                .unwrap_or_else(|| DEFAULT_CONTROLLER_URL.to_string()),
        };

        let provider = if let Some(api_key) = var("OPENAI_API_KEY") {
            Some(ProviderConfig::OpenAi {
                api_key,
                model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            })
        } else {
            var("GEMINI_API_KEY").map(|api_key| ProviderConfig::Gemini {
                api_key,
                model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            })
        };

        Ok(Config { pinecone, provider })
    }

    /// The query path cannot run without a generation backend.
    pub fn require_provider(&self) -> Result<&ProviderConfig> {
        self.provider.as_ref().ok_or_else(|| {
            GaitError::Configuration(
                "neither OPENAI_API_KEY nor GEMINI_API_KEY is set".to_string(),
            )
        })
    }
}
