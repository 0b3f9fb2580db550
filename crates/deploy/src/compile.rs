//! Contract compilation.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::config::ProjectConfig;

/// Runs `forge build` for the contract project.
#[derive(Debug, Clone)]
pub struct Forge {
    project: ProjectConfig,
}

impl Forge {
    pub fn new(project: ProjectConfig) -> Self {
        Self { project }
    }

    /// The full command line, without the executable.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "--out".to_string(),
            self.project.out.display().to_string(),
        ];
        args.extend(self.project.build_args.iter().cloned());
        args
    }

    /// Compile the project. Fails if the compiler exits with a non-zero status.
    pub async fn build(&self) -> Result<()> {
        let args = self.build_args();

        tracing::info!(
            root = %self.project.root.display(),
            command = %format!("{} {}", self.project.forge, args.join(" ")),
            "Compiling contracts..."
        );

        let output = Command::new(&self.project.forge)
            .args(&args)
            .current_dir(&self.project.root)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to execute `{}`", self.project.forge))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            tracing::debug!(target: "forge", "{}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Compilation failed ({}):\n{}{}",
                output.status,
                stdout,
                stderr
            );
        }

        tracing::info!("Compilation finished");

        Ok(())
    }
}
