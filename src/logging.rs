use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Append-only log shared by every stage of a run.
///
/// Lines go to the `<out>.log` file (when one is attached), to `tracing`, and
/// to an in-memory history so callers can inspect what a run reported.
#[derive(Debug, Default)]
pub struct LogSink {
    file: Option<File>,
    print: bool,
    history: Vec<String>,
}

impl LogSink {
    pub fn to_file(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self {
            file: Some(file),
            print: true,
            history: Vec::new(),
        })
    }

    /// A sink that only records lines; nothing is printed or written.
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn log_line(&mut self, message: &str) -> Result<()> {
        if self.print {
            info!("{message}");
        }
        self.record(message)
    }

    pub fn warn_line(&mut self, message: &str) -> Result<()> {
        if self.print {
            warn!("{message}");
        }
        self.record(message)
    }

    pub fn lines(&self) -> &[String] {
        &self.history
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.history.iter().any(|line| line.contains(needle))
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn record(&mut self, message: &str) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{message}")?;
        }
        self.history.push(message.to_string());
        Ok(())
    }
}
