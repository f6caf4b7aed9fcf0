//! Generation-driven black-box optimization.
//!
//! An optimizer proposes a population of parameter vectors, a dispatcher
//! evaluates them (in-process, on a thread pool, or through a filesystem
//! transport to external workers), and the optimizer folds the fitness
//! values back into its next proposal:
//!
//! - **Evolution Strategies (ES)**: natural-evolution-strategy gradient
//!   estimate from Gaussian perturbations, with mirrored sampling and rank
//!   based fitness shaping.
//! - **Gradient Descent (GD)**: least-squares gradient fit from random
//!   finite differences, with classic, stochastic, Adam, and RMSProp update
//!   rules.
//! - **Dispatch**: run-id keyed evaluation with per-run failure isolation
//!   and a bounded poll/re-dispatch loop for asynchronous transports.
//! - **Recording**: per-run and per-generation trajectory records,
//!   parameter snapshots, and final summaries.
//!
//! # Architecture
//!
//! The optimizer is a plain state machine (`Initialized -> Running ->
//! Stopped`) that knows nothing about execution. [`driver::Experiment`]
//! owns the trajectory store and lends it, together with an explicit
//! [`dispatch::DispatchContext`], to the dispatcher and recorder. Every
//! random draw flows from one seed, so a run is reproducible and can be
//! checkpointed and resumed bit-identically.

pub mod base;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod es;
pub mod gd;
pub mod optimizee;
pub mod optimizer;
pub mod recorder;
