use crate::config::Overrides;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ytlearn")]
#[command(about = "Turn a YouTube video into a summary, key points, a quiz and related resources")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub llm: LlmArgs,
}

#[derive(Args, Debug, Default, Clone)]
pub struct LlmArgs {
    /// LLM provider: openai, groq or huggingface (overrides LLM_PROVIDER)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model name (overrides LLM_MODEL)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// API key for the provider (overrides the environment)
    #[arg(long, global = true)]
    pub api_key: Option<String>,
}

impl From<LlmArgs> for Overrides {
    fn from(args: LlmArgs) -> Self {
        Self {
            provider: args.provider,
            model: args.model,
            api_key: args.api_key,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the full learning package for a video
    Process {
        /// YouTube video URL
        url: String,

        /// Print the whole result as JSON
        #[arg(long)]
        json: bool,

        /// Take the quiz right after processing
        #[arg(short, long)]
        play: bool,
    },

    /// Fetch a video's transcript and take a quiz on it
    Quiz {
        /// YouTube video URL
        url: String,
    },

    /// Open TUI interface
    Tui,
}
