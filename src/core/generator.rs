use crate::config::Config;
use crate::error::{Error, Result};
use async_openai::{
    self,
    config::OpenAIConfig,
    types::responses::{
        CreateResponseArgs, EasyInputMessageArgs, InputItem, InputParam, OutputItem,
        OutputMessageContent, Role,
    },
};
use async_trait::async_trait;
use secrecy::ExposeSecret;

/// Prompt in, raw text out. Everything about models and auth stays behind this seam.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32, max_output_tokens: u32)
    -> Result<String>;
}

#[derive(Clone)]
pub struct OpenAiGenerator {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut client_config = OpenAIConfig::new();
        if let Some(key) = &config.api_key {
            client_config = client_config.with_api_key(key.expose_secret());
        }
        if let Some(base) = config.provider.api_base() {
            client_config = client_config.with_api_base(base);
        }

        log::info!(
            "Using {} model {} for text generation",
            config.provider,
            config.model
        );

        Ok(Self {
            client: async_openai::Client::with_config(client_config),
            model: config.model.clone(),
        })
    }

    async fn request(&self, prompt: &str, temperature: f32, max_output_tokens: u32) -> Result<String> {
        let request = CreateResponseArgs::default()
            .model(self.model.as_str())
            .temperature(temperature)
            .max_output_tokens(max_output_tokens)
            .input(InputParam::Items(vec![InputItem::EasyMessage(
                EasyInputMessageArgs::default()
                    .role(Role::User)
                    .content(prompt)
                    .build()?,
            )]))
            .build()?;

        let response = self.client.responses().create(request).await?;

        let mut content = String::new();
        for output in response.output {
            if let OutputItem::Message(out) = output {
                for c in out.content {
                    match c {
                        OutputMessageContent::OutputText(text) => content.push_str(&text.text),
                        other => log::debug!("Ignoring non-text output part: {other:?}"),
                    }
                }
            }
        }

        Ok(content)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<String> {
        log::debug!(
            "Generating with temperature {temperature} ({} prompt chars)",
            prompt.chars().count()
        );
        self.request(prompt, temperature, max_output_tokens)
            .await
            .map_err(|e| match e {
                Error::Generation(_) => e,
                other => Error::generation(other.to_string()),
            })
    }
}

/// Keeps at most `max_chars` characters, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
pub mod testing {
    use super::TextGenerator;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses in order and records every prompt it was given.
    #[derive(Default)]
    pub struct ScriptedGenerator {
        responses: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, text: impl Into<String>) -> Self {
            self.push(Ok(text.into()))
        }

        pub fn fail(self, message: &str) -> Self {
            self.push(Err(Error::generation(message)))
        }

        fn push(self, response: Result<String>) -> Self {
            self.responses
                .lock()
                .expect("responses lock")
                .push_back(response);
            self
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompts lock").clone()
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().expect("prompts lock").len()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str, _temperature: f32, _max: u32) -> Result<String> {
            self.prompts
                .lock()
                .expect("prompts lock")
                .push(prompt.to_string());
            self.responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .unwrap_or_else(|| Err(Error::generation("script exhausted")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_chars;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
