use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// GitHub Actions step outputs.
///
/// Appends `name=value` lines to the file named by `GITHUB_OUTPUT`; without
/// it, falls back to the legacy `::set-output` workflow command on stdout.
pub struct CiOutput {
    target: Option<PathBuf>,
    stdout_fallback: bool,
}

impl CiOutput {
    pub fn from_env() -> Self {
        let target = std::env::var_os("GITHUB_OUTPUT")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self {
            target,
            stdout_fallback: true,
        }
    }

    /// Keep stdout clean (e.g. for JSON output) when no output file is set
    pub fn with_stdout_fallback(mut self, enabled: bool) -> Self {
        self.stdout_fallback = enabled;
        self
    }

    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        match &self.target {
            Some(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open GITHUB_OUTPUT file {}", path.display()))?;
                writeln!(file, "{}={}", name, value)
                    .with_context(|| format!("Failed to write output '{}'", name))?;
            }
            None if self.stdout_fallback => println!("::set-output name={}::{}", name, value),
            None => {}
        }
        Ok(())
    }
}
