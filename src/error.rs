use derive_more::{Display, From};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, From)]
pub enum Error {
    /// Video or transcript could not be obtained. Fatal to the pipeline.
    #[display("{_0}")]
    #[from(skip)]
    Retrieval(String),

    /// The text generator call failed. Local to the stage that made it.
    #[display("{_0}")]
    #[from(skip)]
    Generation(String),

    /// Generator output could not be turned into the expected payload.
    #[display("{_0}")]
    #[from(skip)]
    Parse(String),

    #[display("Configuration error: {_0}")]
    #[from(skip)]
    Config(String),

    #[display("{_0}")]
    #[from(skip)]
    Custom(String),

    #[display("IO error: {_0}")]
    Io(std::io::Error),

    #[display("JSON error: {_0}")]
    Json(serde_json::Error),

    #[display("HTTP error: {_0}")]
    Http(reqwest::Error),

    #[display("LLM error: {_0}")]
    OpenAi(async_openai::error::OpenAIError),
}

impl Error {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval(message.into())
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl std::error::Error for Error {}
