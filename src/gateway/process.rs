//! Engine gateway backed by a child process.

use std::cell::OnceCell;
use std::fs;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use super::{EngineGateway, GatewayConfig};
use crate::error::{EngineError, ModelError, ModelResult};
use crate::model::Model;

/// Runs the configured engine executable.
///
/// Each call gets a scratch directory for the engine's output file; the
/// directory is removed when the call returns, whatever the outcome. The
/// first successful run fixes the engine version for the lifetime of the
/// gateway.
#[derive(Debug)]
pub struct ProcessGateway {
    config: GatewayConfig,
    version: OnceCell<String>,
}

impl ProcessGateway {
    #[must_use]
    pub const fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            version: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Engine version seen by the first successful run, if any.
    #[must_use]
    pub fn session_version(&self) -> Option<&str> {
        self.version.get().map(String::as_str)
    }

    fn check_payload(&self, model: &Model) -> Result<(), EngineError> {
        if model.application != self.config.application {
            return Err(EngineError::Payload {
                reason: format!(
                    "application '{}' does not match '{}'",
                    model.application, self.config.application
                ),
            });
        }
        let session = self.version.get_or_init(|| model.version.clone());
        if *session != model.version {
            return Err(EngineError::Payload {
                reason: format!(
                    "version '{}' differs from session version '{session}'",
                    model.version
                ),
            });
        }
        Ok(())
    }
}

impl EngineGateway for ProcessGateway {
    fn run(&self, args: &[String]) -> ModelResult<Model> {
        let scratch = tempfile::Builder::new()
            .prefix("gldmodel-")
            .tempdir()
            .map_err(|source| ModelError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        let output_path = scratch.path().join("output.json");

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.options)
            .args(args)
            .arg("-o")
            .arg(&output_path)
            .stdin(Stdio::null());
        debug!(
            command = %self.config.command.display(),
            ?args,
            output = %output_path.display(),
            "running engine"
        );

        let output = command
            .output()
            .map_err(|source| EngineError::Spawn { source })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !self.config.silent {
            if !stdout.trim().is_empty() {
                info!(stdout = %stdout.trim(), "engine output");
            }
            if !stderr.trim().is_empty() {
                warn!(stderr = %stderr.trim(), "engine errors");
            }
        }

        if !output.status.success() {
            return Err(EngineError::Failed {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        let text = fs::read_to_string(&output_path).map_err(|e| EngineError::Payload {
            reason: format!("cannot read '{}': {e}", output_path.display()),
        })?;
        let model = Model::from_json(&text).map_err(|e| EngineError::Payload {
            reason: e.to_string(),
        })?;
        self.check_payload(&model)?;
        debug!(version = %model.version, objects = model.graph.objects.len(), "engine run complete");
        Ok(model)
    }
}
