use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::fmt;

const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_LANGUAGES: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Groq,
    HuggingFace,
}

impl Provider {
    /// Accepts loose spellings such as "Hugging Face", "hugging-face" or "HF".
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect();

        match normalized.as_str() {
            "openai" => Ok(Self::OpenAi),
            "groq" => Ok(Self::Groq),
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            other => Err(Error::config(format!("Unknown LLM provider '{other}'"))),
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Groq => "qwen/qwen3-32b",
            Self::HuggingFace => "Qwen/Qwen3-8B",
        }
    }

    /// `None` means the client's default OpenAI endpoint.
    pub fn api_base(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => None,
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::HuggingFace => Some("https://router.huggingface.co/v1"),
        }
    }

    pub fn key_variable(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::HuggingFace => "HUGGINGFACEHUB_API_TOKEN",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenAi => "OpenAI",
            Self::Groq => "Groq",
            Self::HuggingFace => "Hugging Face",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub provider: Provider,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub max_tokens: u32,
    pub tavily_api_key: Option<SecretString>,
    pub languages: Vec<String>,
}

/// Command-line values that take precedence over the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

impl Config {
    pub fn from_env_with(overrides: &Overrides) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::build(|name| env::var(name).ok(), overrides)
    }

    fn build(lookup: impl Fn(&str) -> Option<String>, overrides: &Overrides) -> Result<Self> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let provider = match overrides.provider.clone().or_else(|| non_empty("LLM_PROVIDER")) {
            Some(raw) => Provider::parse(&raw)?,
            None => Provider::Groq,
        };

        let api_key = overrides
            .api_key
            .clone()
            .or_else(|| non_empty("LLM_API_KEY"))
            .or_else(|| non_empty(provider.key_variable()))
            .map(|k| SecretString::from(k.trim().to_string()));

        let model = overrides
            .model
            .clone()
            .or_else(|| non_empty("LLM_MODEL"))
            .unwrap_or_else(|| provider.default_model().to_string());

        let max_tokens = non_empty("LLM_MAX_TOKENS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let languages = non_empty("TRANSCRIPT_LANGUAGES")
            .unwrap_or_else(|| DEFAULT_LANGUAGES.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            provider,
            api_key,
            model,
            max_tokens,
            tavily_api_key: non_empty("TAVILY_API_KEY").map(SecretString::from),
            languages,
        })
    }

    /// Checks that the generator can actually be reached with this configuration.
    pub fn validate(&self) -> Result<()> {
        let Some(key) = &self.api_key else {
            return Err(Error::config(format!(
                "{} not found. Set it in the environment or pass --api-key.",
                self.provider.key_variable()
            )));
        };

        if self.provider == Provider::HuggingFace && !key.expose_secret().starts_with("hf_") {
            return Err(Error::config(
                "Invalid Hugging Face token format. It should start with 'hf_'.",
            ));
        }

        Ok(())
    }

    pub fn has_search(&self) -> bool {
        self.tavily_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)], overrides: Overrides) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::build(|name| vars.get(name).cloned(), &overrides)
    }

    #[test]
    fn provider_names_are_normalized() {
        assert_eq!(Provider::parse("Hugging Face").unwrap(), Provider::HuggingFace);
        assert_eq!(Provider::parse("hugging_face").unwrap(), Provider::HuggingFace);
        assert_eq!(Provider::parse(" OpenAI ").unwrap(), Provider::OpenAi);
        assert!(Provider::parse("anthropomorphic").is_err());
    }

    #[test]
    fn defaults_to_groq_with_its_model() {
        let config = config_from(&[("GROQ_API_KEY", "gsk_test")], Overrides::default())
            .expect("config");
        assert_eq!(config.provider, Provider::Groq);
        assert_eq!(config.model, "qwen/qwen3-32b");
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.languages, vec!["en".to_string()]);
        assert!(config.validate().is_ok());
        assert!(!config.has_search());
    }

    #[test]
    fn overrides_win_over_environment() {
        let config = config_from(
            &[("LLM_PROVIDER", "groq"), ("LLM_MODEL", "env-model")],
            Overrides {
                provider: Some("openai".into()),
                model: Some("cli-model".into()),
                api_key: Some("sk-cli".into()),
            },
        )
        .expect("config");
        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.model, "cli-model");
        assert_eq!(
            config.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("sk-cli".to_string())
        );
    }

    #[test]
    fn missing_key_fails_validation() {
        let config = config_from(&[("LLM_PROVIDER", "openai")], Overrides::default())
            .expect("config");
        assert!(config.validate().is_err());
    }

    #[test]
    fn hugging_face_token_needs_prefix() {
        let bad = config_from(
            &[("LLM_PROVIDER", "hf"), ("HUGGINGFACEHUB_API_TOKEN", "abc")],
            Overrides::default(),
        )
        .expect("config");
        assert!(bad.validate().is_err());

        let good = config_from(
            &[("LLM_PROVIDER", "hf"), ("HUGGINGFACEHUB_API_TOKEN", "hf_abc")],
            Overrides::default(),
        )
        .expect("config");
        assert!(good.validate().is_ok());
    }

    #[test]
    fn languages_and_token_ceiling_are_read() {
        let config = config_from(
            &[
                ("TRANSCRIPT_LANGUAGES", "en, es ,,fr"),
                ("LLM_MAX_TOKENS", "4096"),
                ("TAVILY_API_KEY", "tvly-x"),
            ],
            Overrides::default(),
        )
        .expect("config");
        assert_eq!(config.languages, vec!["en", "es", "fr"]);
        assert_eq!(config.max_tokens, 4096);
        assert!(config.has_search());
    }
}
