//! Bearer credential acquisition for the upstream API.
//!
//! The credential source is injected into the upstream client rather than
//! living in ambient module state. Two sources are supported: a static token
//! from the environment (validated at startup, so a missing credential fails
//! before any connection is opened) and an external command (e.g.
//! `gcloud auth print-access-token`) whose output is cached with a TTL.

use crate::types::{Result, VeristreamError};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug)]
struct CachedToken {
    token: String,
    fetched_at: Instant,
}

#[derive(Debug)]
enum Source {
    Static {
        token: String,
    },
    Command {
        program: String,
        args: Vec<String>,
        ttl: Duration,
        cache: RwLock<Option<CachedToken>>,
    },
}

#[derive(Debug)]
pub struct TokenProvider {
    source: Source,
}

impl TokenProvider {
    /// Fixed token, used directly.
    pub fn from_static(token: impl Into<String>) -> Self {
        Self {
            source: Source::Static {
                token: token.into(),
            },
        }
    }

    /// Static token from an environment variable. Errors when the variable
    /// is missing or empty.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::from_static(token.trim())),
            _ => Err(VeristreamError::Credentials(format!(
                "environment variable {} is missing or empty",
                var
            ))
            .into()),
        }
    }

    /// Token refreshed by running an external command. The first word of
    /// `command_line` is the program, the rest are arguments.
    pub fn from_command(command_line: &str, ttl: Duration) -> Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = match parts.next() {
            Some(p) => p.to_string(),
            None => {
                return Err(
                    VeristreamError::Credentials("token command is empty".into()).into(),
                )
            }
        };
        Ok(Self {
            source: Source::Command {
                program,
                args: parts.map(str::to_string).collect(),
                ttl,
                cache: RwLock::new(None),
            },
        })
    }

    pub async fn bearer_token(&self) -> Result<String> {
        match &self.source {
            Source::Static { token } => Ok(token.clone()),
            Source::Command {
                program,
                args,
                ttl,
                cache,
            } => {
                {
                    let guard = cache.read().await;
                    if let Some(cached) = guard.as_ref() {
                        if cached.fetched_at.elapsed() < *ttl {
                            return Ok(cached.token.clone());
                        }
                    }
                }

                let token = Self::fetch_from_command(program, args).await?;
                let mut guard = cache.write().await;
                *guard = Some(CachedToken {
                    token: token.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(token)
            }
        }
    }

    async fn fetch_from_command(program: &str, args: &[String]) -> Result<String> {
        tracing::debug!("[auth] refreshing bearer token via {}", program);
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                VeristreamError::Credentials(format!(
                    "failed to run token command {}: {}",
                    program, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VeristreamError::Credentials(format!(
                "token command {} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            ))
            .into());
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(VeristreamError::Credentials(format!(
                "token command {} produced no output",
                program
            ))
            .into());
        }
        Ok(token)
    }

    /// Whether the provider can plausibly produce a token, for readiness
    /// checks. Does not hit the external command.
    pub fn is_configured(&self) -> bool {
        match &self.source {
            Source::Static { token } => !token.is_empty(),
            Source::Command { program, .. } => crate::toolchain::binary_on_path(program),
        }
    }
}
