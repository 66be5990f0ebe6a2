//! Boundary to the external simulation engine.
//!
//! The engine is a separate executable that writes a JSON model to a path
//! given with `-o`. Calls are blocking and never overlap: every operation
//! that needs the engine borrows an [`EngineGateway`] for the duration of
//! one call.

mod process;

use std::fs;
use std::path::PathBuf;

use tracing::debug;

pub use process::ProcessGateway;

use crate::error::{ModelError, ModelResult};
use crate::model::{Model, APPLICATION};

/// Runs the engine with an argument list and returns the model it wrote.
pub trait EngineGateway {
    /// Runs the engine once.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EngineError`] when the engine cannot be
    /// started, exits non-zero, or writes an unusable model.
    fn run(&self, args: &[String]) -> ModelResult<Model>;
}

impl<F> EngineGateway for F
where
    F: Fn(&[String]) -> ModelResult<Model>,
{
    fn run(&self, args: &[String]) -> ModelResult<Model> {
        self(args)
    }
}

/// Engine invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Engine executable.
    pub command: PathBuf,
    /// Options placed before every argument list.
    pub options: Vec<String>,
    /// Application tag the engine must write.
    pub application: String,
    /// When false, engine stdout and stderr are logged.
    pub silent: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("gridlabd"),
            options: Vec::new(),
            application: APPLICATION.to_string(),
            silent: true,
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn with_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.command = command.into();
        self
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }

    #[must_use]
    pub const fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

/// Caller-owned cache of the engine's empty model.
///
/// The first request runs the engine with no arguments; later requests get
/// a copy of that result.
#[derive(Debug, Default)]
pub struct BootstrapCache {
    fresh: Option<Model>,
}

impl BootstrapCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the engine's empty model.
    pub fn fresh_model(&mut self, gateway: &dyn EngineGateway) -> ModelResult<Model> {
        if let Some(model) = &self.fresh {
            debug!("fresh model served from cache");
            return Ok(model.clone());
        }
        let model = gateway.run(&[])?;
        self.fresh = Some(model.clone());
        Ok(model)
    }

    /// Returns true once a fresh model has been cached.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        self.fresh.is_some()
    }

    /// Drops the cached model.
    pub fn clear(&mut self) {
        self.fresh = None;
    }
}

/// Runs a model through the engine and returns the model it writes back.
///
/// The model is written to a scratch file that is removed when the call
/// returns. `options` go before the model path.
pub fn run_model(model: &Model, gateway: &dyn EngineGateway, options: &[String]) -> ModelResult<Model> {
    let scratch = tempfile::Builder::new()
        .prefix("gldmodel-")
        .tempdir()
        .map_err(|source| ModelError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
    let input = scratch.path().join("input.json");
    fs::write(&input, model.to_json_pretty()?).map_err(|source| ModelError::Io {
        path: input.clone(),
        source,
    })?;

    let mut args = options.to_vec();
    args.push(input.display().to_string());
    gateway.run(&args)
}
