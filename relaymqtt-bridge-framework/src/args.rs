//! CLI argument parsing for bridges.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::error::{BridgeError, Result};

/// Common CLI arguments for all bridges.
#[derive(Parser, Debug, Clone)]
#[command(about = "relaymqtt protocol bridge", version)]
pub struct BridgeArgs {
    /// Path to configuration file (JSON5 format).
    ///
    /// When omitted, the bridge's default locations are searched in order.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Parse CLI arguments.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Resolve the configuration file to load.
    ///
    /// An explicit `--config` wins. Otherwise the first existing path among
    /// `candidates` is used.
    pub fn resolve_config(&self, candidates: &[&str]) -> Result<PathBuf> {
        if let Some(path) = &self.config {
            return Ok(path.clone());
        }

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
            .ok_or_else(|| BridgeError::ConfigNotFound {
                path: candidates.join(", "),
            })
    }
}
