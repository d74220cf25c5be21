// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! External command execution for compose stacks

use crate::error::{Result, UpdaterError};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` (whitespace separated program and leading arguments)
    /// followed by `args` inside `dir`. A non-zero exit is an error.
    async fn run(&self, dir: &Path, command: &str, args: &[&str]) -> Result<()>;
}

/// Runs commands as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, dir: &Path, command: &str, args: &[&str]) -> Result<()> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| UpdaterError::Process("empty command".to_owned()))?;

        let rendered = format!("{command} {}", args.join(" "));
        tracing::debug!("Running `{rendered}` in {}", dir.display());

        let output = Command::new(program)
            .args(parts)
            .args(args)
            .current_dir(dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| UpdaterError::Process(format!("Failed to start `{rendered}`: {e}")))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        tracing::warn!("`{rendered}` failed with {}: {stderr}", output.status);
        Err(UpdaterError::Process(if stderr.is_empty() {
            format!("`{rendered}` exited with {}", output.status)
        } else {
            format!("`{rendered}` exited with {}: {stderr}", output.status)
        }))
    }
}
