use crate::error::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;

const LOG_FILE: &str = "ytlearn.log";

pub enum LogTarget {
    Stderr,
    /// The TUI owns the terminal, so records go to a file instead.
    File,
}

pub fn log_file_path() -> PathBuf {
    std::env::temp_dir().join(LOG_FILE)
}

pub fn init(target: LogTarget) -> Result<()> {
    let default_filter = match target {
        LogTarget::Stderr => "warn",
        LogTarget::File => "info",
    };

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));

    if let LogTarget::File = target {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path())?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    // A second init (tests, repeated runs) is not an error worth surfacing.
    let _ = builder.try_init();
    Ok(())
}
