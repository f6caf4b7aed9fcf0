//! Start and end notifications for an optimization run.

use super::store::TrajectoryStore;
use crate::optimizee::Optimizee;
use crate::optimizer::{Optimizer, OptimizerSummary};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Parameter group written by [`Recorder::start`] for the optimizer.
pub const OPTIMIZER_GROUP: &str = "optimizer";
/// Parameter group written by [`Recorder::start`] for the optimizee.
pub const OPTIMIZEE_GROUP: &str = "optimizee";
/// Parameter group written by [`Recorder::end`].
pub const SUMMARY_GROUP: &str = "summary";

/// Forwards the optimizer and optimizee parameters at start, and the final
/// summary at end, to a [`TrajectoryStore`].
///
/// Both notifications happen at most once. Store failures are logged and
/// never interrupt the optimization.
#[derive(Debug, Clone)]
pub struct Recorder {
    optimizee_name: String,
    optimizee_params: Value,
    optimizer_name: String,
    optimizer_params: Map<String, Value>,
    started: bool,
    ended: bool,
}

impl Recorder {
    pub fn new(
        optimizee_name: impl Into<String>,
        optimizee_params: Value,
        optimizer_name: impl Into<String>,
        optimizer_params: Map<String, Value>,
    ) -> Self {
        Self {
            optimizee_name: optimizee_name.into(),
            optimizee_params,
            optimizer_name: optimizer_name.into(),
            optimizer_params,
            started: false,
            ended: false,
        }
    }

    /// Snapshots names and parameters of an optimizee and optimizer pair.
    pub fn for_run<O: Optimizee>(optimizee: &O, optimizer: &Optimizer) -> Self {
        Self::new(
            optimizee.name(),
            optimizee.params(),
            optimizer.name(),
            optimizer.get_params(),
        )
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn start(&mut self, store: &mut dyn TrajectoryStore) {
        if self.started {
            return;
        }
        self.started = true;
        info!(
            optimizee = %self.optimizee_name,
            optimizer = %self.optimizer_name,
            "optimization started"
        );

        let mut optimizee = Map::new();
        optimizee.insert("name".into(), Value::from(self.optimizee_name.as_str()));
        optimizee.insert("params".into(), self.optimizee_params.clone());
        if let Err(e) = store.store_params(OPTIMIZEE_GROUP, &optimizee) {
            warn!(error = %e, "failed to record optimizee parameters");
        }

        let mut optimizer = self.optimizer_params.clone();
        optimizer.insert("name".into(), Value::from(self.optimizer_name.as_str()));
        if let Err(e) = store.store_params(OPTIMIZER_GROUP, &optimizer) {
            warn!(error = %e, "failed to record optimizer parameters");
        }
    }

    pub fn end(&mut self, store: &mut dyn TrajectoryStore, summary: &OptimizerSummary) {
        if self.ended {
            return;
        }
        self.ended = true;
        info!(
            generations = summary.generations,
            total_runs = summary.total_runs,
            failed_runs = summary.failed_runs,
            best = ?summary.best.as_ref().map(|b| b.fitness),
            "optimization ended"
        );

        match serde_json::to_value(summary) {
            Ok(Value::Object(fields)) => {
                if let Err(e) = store.store_params(SUMMARY_GROUP, &fields) {
                    warn!(error = %e, "failed to record summary");
                }
            }
            Ok(_) => warn!("summary did not serialize to an object"),
            Err(e) => warn!(error = %e, "failed to serialize summary"),
        }
    }
}
