//! Filesystem transport.
//!
//! The dispatcher writes one input record per run, hands the run-ids to a
//! [`JobLauncher`], and polls for a sentinel file per run. A worker (see
//! [`FileWorker`]) reads the input, evaluates, writes the result record, and
//! only then creates the sentinel, so a visible sentinel always means a
//! complete result.
//!
//! ```text
//! <root>/inputs/run_<gen>_<id>.json    written by the dispatcher
//! <root>/results/run_<gen>_<id>.json   written by the worker
//! <root>/ready/run_<gen>_<id>.ready    created by the worker, last
//! ```

use super::poll::{wait_for_keys, PollPolicy};
use super::types::{
    evaluate_with_seed, DispatchContext, DispatchError, DispatchResults, Dispatcher,
};
use crate::base::{FitnessOutcome, Individual, Population, RunId};
use crate::error::{OptimError, Result};
use crate::optimizee::Optimizee;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a worker receives for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    pub generation: usize,
    pub run_id: RunId,
    pub seed: u64,
    pub individual: Individual,
}

/// What a worker reports for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub generation: usize,
    pub run_id: RunId,
    pub outcome: FitnessOutcome,
}

/// Directory layout shared by [`FileDispatcher`] and [`FileWorker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    root: PathBuf,
}

impl FileLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_path(&self, generation: usize, run_id: RunId) -> PathBuf {
        self.root
            .join("inputs")
            .join(format!("run_{generation}_{run_id}.json"))
    }

    pub fn result_path(&self, generation: usize, run_id: RunId) -> PathBuf {
        self.root
            .join("results")
            .join(format!("run_{generation}_{run_id}.json"))
    }

    pub fn ready_path(&self, generation: usize, run_id: RunId) -> PathBuf {
        self.root
            .join("ready")
            .join(format!("run_{generation}_{run_id}.ready"))
    }

    /// Creates the three subdirectories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for sub in ["inputs", "results", "ready"] {
            fs::create_dir_all(self.root.join(sub))?;
        }
        Ok(())
    }

    /// Deletes every run file of a generation before `generation`: inputs
    /// nobody served, and results or sentinels that arrived too late.
    /// Returns how many files were removed.
    pub fn sweep_before(&self, generation: usize) -> std::io::Result<usize> {
        let mut removed = 0;
        for sub in ["inputs", "results", "ready"] {
            let dir = self.root.join(sub);
            if !dir.exists() {
                continue;
            }
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let stale = entry
                    .file_name()
                    .to_str()
                    .and_then(parse_run_file)
                    .is_some_and(|(g, _)| g < generation);
                if stale {
                    remove_if_exists(&entry.path())?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Run-ids of `generation` whose input exists but whose sentinel does not.
    pub fn pending_runs(&self, generation: usize) -> std::io::Result<Vec<RunId>> {
        let prefix = format!("run_{generation}_");
        let mut runs = Vec::new();
        for entry in fs::read_dir(self.root.join("inputs"))? {
            let name = entry?.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse::<RunId>().ok())
            else {
                continue;
            };
            if !self.ready_path(generation, id).exists() {
                runs.push(id);
            }
        }
        runs.sort_unstable();
        Ok(runs)
    }
}

/// Starts the work for a set of runs whose inputs have been written.
///
/// A cluster launcher would submit a job array; [`NoopLauncher`] assumes
/// workers already watch the input directory.
pub trait JobLauncher {
    fn launch(
        &mut self,
        layout: &FileLayout,
        generation: usize,
        run_ids: &[RunId],
    ) -> std::result::Result<(), String>;
}

/// Launches nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLauncher;

impl JobLauncher for NoopLauncher {
    fn launch(&mut self, _: &FileLayout, _: usize, _: &[RunId]) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl<F> JobLauncher for F
where
    F: FnMut(&FileLayout, usize, &[RunId]) -> std::result::Result<(), String>,
{
    fn launch(
        &mut self,
        layout: &FileLayout,
        generation: usize,
        run_ids: &[RunId],
    ) -> std::result::Result<(), String> {
        self(layout, generation, run_ids)
    }
}

/// Dispatches through the filesystem and polls for sentinel files.
#[derive(Debug, Clone)]
pub struct FileDispatcher<L = NoopLauncher> {
    layout: FileLayout,
    policy: PollPolicy,
    launcher: L,
}

impl FileDispatcher<NoopLauncher> {
    pub fn new(root: impl Into<PathBuf>, policy: PollPolicy) -> Self {
        Self::with_launcher(root, policy, NoopLauncher)
    }
}

impl<L: JobLauncher> FileDispatcher<L> {
    pub fn with_launcher(root: impl Into<PathBuf>, policy: PollPolicy, launcher: L) -> Self {
        Self {
            layout: FileLayout::new(root),
            policy,
            launcher,
        }
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    fn write_inputs(&self, ctx: &DispatchContext, batch: &Population) -> Result<()> {
        for (&run_id, individual) in batch {
            // A re-dispatched run must not be satisfied by its stale sentinel.
            remove_if_exists(&self.layout.ready_path(ctx.generation, run_id))?;
            let input = RunInput {
                generation: ctx.generation,
                run_id,
                seed: ctx.seed_for(run_id),
                individual: individual.clone(),
            };
            write_atomic(
                &self.layout.input_path(ctx.generation, run_id),
                &serde_json::to_vec(&input)?,
            )?;
        }
        Ok(())
    }

    /// Reads one result and consumes its files.
    fn collect(&self, generation: usize, run_id: RunId) -> Result<FitnessOutcome> {
        let result_path = self.layout.result_path(generation, run_id);
        let outcome = match fs::read(&result_path)
            .map_err(OptimError::from)
            .and_then(|bytes| Ok(serde_json::from_slice::<RunOutput>(&bytes)?))
        {
            Ok(output) if output.run_id == run_id && output.generation == generation => {
                output.outcome
            }
            Ok(output) => FitnessOutcome::Failed(format!(
                "result file names run {} of generation {}",
                output.run_id, output.generation
            )),
            Err(e) => FitnessOutcome::Failed(format!("unreadable result: {e}")),
        };
        self.remove_run_files(generation, run_id)?;
        Ok(outcome)
    }

    /// Input first, so a worker scanning for pending runs cannot pick the
    /// run up again.
    fn remove_run_files(&self, generation: usize, run_id: RunId) -> std::io::Result<()> {
        remove_if_exists(&self.layout.input_path(generation, run_id))?;
        remove_if_exists(&self.layout.result_path(generation, run_id))?;
        remove_if_exists(&self.layout.ready_path(generation, run_id))
    }
}

impl<L: JobLauncher> Dispatcher for FileDispatcher<L> {
    fn dispatch(
        &mut self,
        ctx: &DispatchContext,
        batch: &Population,
    ) -> std::result::Result<DispatchResults, DispatchError> {
        if batch.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }
        let generation = ctx.generation;
        self.layout.ensure_dirs()?;
        let swept = self.layout.sweep_before(generation)?;
        if swept > 0 {
            debug!(generation, swept, "removed files of earlier generations");
        }
        self.write_inputs(ctx, batch).map_err(to_transport)?;

        let run_ids: Vec<RunId> = batch.keys().copied().collect();
        self.launcher
            .launch(&self.layout, generation, &run_ids)
            .map_err(DispatchError::Transport)?;
        info!(generation, runs = run_ids.len(), root = %self.layout.root.display(), "runs launched");

        let layout = &self.layout;
        let missing = match wait_for_keys(run_ids.iter().copied(), &self.policy, |&id| {
            layout.ready_path(generation, id).exists()
        }) {
            Ok(()) => Vec::new(),
            Err(missing) => missing.into_iter().collect(),
        };

        let mut completed = DispatchResults::new();
        for &run_id in &run_ids {
            if missing.contains(&run_id) {
                continue;
            }
            let outcome = self.collect(generation, run_id).map_err(to_transport)?;
            debug!(generation, run_id, failed = outcome.is_failed(), "result collected");
            completed.insert(run_id, outcome);
        }

        if missing.is_empty() {
            Ok(completed)
        } else {
            warn!(generation, missing = missing.len(), "runs did not report in time");
            Err(DispatchError::Timeout { completed, missing })
        }
    }

    fn abandon(
        &mut self,
        ctx: &DispatchContext,
        run_ids: &[RunId],
    ) -> std::result::Result<(), DispatchError> {
        for &run_id in run_ids {
            self.remove_run_files(ctx.generation, run_id)?;
        }
        debug!(generation = ctx.generation, runs = run_ids.len(), "abandoned runs cleaned up");
        Ok(())
    }
}

/// Evaluates runs written by a [`FileDispatcher`].
#[derive(Debug, Clone)]
pub struct FileWorker<O> {
    layout: FileLayout,
    optimizee: O,
}

impl<O: Optimizee> FileWorker<O> {
    pub fn new(root: impl Into<PathBuf>, optimizee: O) -> Self {
        Self {
            layout: FileLayout::new(root),
            optimizee,
        }
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    /// Evaluates one run: read input, simulate, write result, create the
    /// sentinel.
    pub fn serve(&self, generation: usize, run_id: RunId) -> Result<()> {
        let input: RunInput =
            serde_json::from_slice(&fs::read(self.layout.input_path(generation, run_id))?)?;
        let outcome = evaluate_with_seed(
            &self.optimizee,
            input.generation,
            input.run_id,
            input.seed,
            &input.individual,
        );
        let output = RunOutput {
            generation,
            run_id,
            outcome,
        };
        write_atomic(
            &self.layout.result_path(generation, run_id),
            &serde_json::to_vec(&output)?,
        )?;
        fs::write(self.layout.ready_path(generation, run_id), b"")?;
        Ok(())
    }

    /// Serves every pending run of `generation`. Returns how many were served.
    pub fn serve_pending(&self, generation: usize) -> Result<usize> {
        self.layout.ensure_dirs()?;
        let pending = self.layout.pending_runs(generation)?;
        for &run_id in &pending {
            self.serve(generation, run_id)?;
        }
        Ok(pending.len())
    }
}

fn to_transport(e: OptimError) -> DispatchError {
    match e {
        OptimError::Io(io) => DispatchError::Io(io),
        other => DispatchError::Transport(other.to_string()),
    }
}

/// `run_<gen>_<id>.<ext>` to `(gen, id)`.
fn parse_run_file(name: &str) -> Option<(usize, RunId)> {
    let (stem, _) = name.rsplit_once('.')?;
    let (generation, run_id) = stem.strip_prefix("run_")?.split_once('_')?;
    Some((generation.parse().ok()?, run_id.parse().ok()?))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
