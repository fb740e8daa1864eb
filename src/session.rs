//! This module contains the analysis session, which analyzes many methods
//! with a shared configuration.
//!
//! Every method is walked in isolation. A walk that fails, whether through an
//! error or a panic, is reported as an [`AnalysisFailure`] for that method
//! alone, and never affects the analysis of the others.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use rayon::prelude::*;

use crate::{
    analyzer,
    cfg::Cfg,
    check::Checks,
    error::AnalysisFailure,
    graph,
    report::AnalysisReport,
    watchdog::{DynWatchdog, LazyWatchdog},
};

/// The result of analyzing a single method.
pub type AnalysisResult = Result<AnalysisReport, AnalysisFailure>;

/// A session in which any number of methods are analyzed.
///
/// Checks hold state for the duration of a single walk, so the session builds
/// a fresh set of them for every method using its check factory.
#[derive(Clone, Debug)]
pub struct Session {
    /// The configuration used for every walk.
    config: graph::Config,

    /// Builds the checks for a single walk.
    checks: fn() -> Checks,

    /// The watchdog shared by every walk in the session.
    watchdog: DynWatchdog,
}

impl Session {
    /// Constructs a new session that walks methods using the provided
    /// `config` and `watchdog`, running the default checks.
    #[must_use]
    pub fn new(config: graph::Config, watchdog: DynWatchdog) -> Self {
        Self {
            config,
            checks: Checks::default,
            watchdog,
        }
    }

    /// Sets the factory used to build the checks for every walk.
    #[must_use]
    pub fn with_checks(mut self, checks: fn() -> Checks) -> Self {
        self.checks = checks;
        self
    }

    /// Gets the configuration used for every walk.
    #[must_use]
    pub fn config(&self) -> &graph::Config {
        &self.config
    }

    /// Analyzes the method described by `cfg`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the walk of the method failed, in which case the
    /// failure has already been logged.
    pub fn analyze(&self, cfg: &Cfg) -> AnalysisResult {
        let method = cfg.method().to_string();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            analyzer::new(
                cfg.clone(),
                self.config.clone(),
                (self.checks)(),
                Arc::clone(&self.watchdog),
            )
            .analyze()
        }));

        let failure = match outcome {
            Ok(Ok(report)) => return Ok(report),
            Ok(Err(error)) => AnalysisFailure::new(method, error.to_string()),
            Err(payload) => AnalysisFailure::new(method, panic_detail(payload.as_ref())),
        };
        log::error!("{failure}");

        Err(failure)
    }

    /// Analyzes every one of the provided `cfgs` in parallel.
    ///
    /// The results are in the same order as the input.
    #[must_use]
    pub fn analyze_all(&self, cfgs: &[Cfg]) -> Vec<AnalysisResult> {
        log::debug!("Analyzing {} methods", cfgs.len());
        cfgs.par_iter().map(|cfg| self.analyze(cfg)).collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(graph::Config::default(), LazyWatchdog.in_arc())
    }
}

/// Gets a description of a panic from its `payload`.
fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("internal error: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("internal error: {message}")
    } else {
        "internal error".to_string()
    }
}
