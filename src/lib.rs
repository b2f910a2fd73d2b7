//! # lesim: Learning Simulator
//!
//! lesim simulates associative learning experiments on virtual subjects. A
//! script declares stimulus elements, behaviors, mechanism parameters,
//! phases and runs; each run drives a learning mechanism through a sequence
//! of phases for a number of subjects and records what happened.
//!
//! ## Script Processing Pipeline
//!
//! ```text
//! Script Text → Script Compiler → (Parameters, Variables, Phases, Runs)
//!             → Run Orchestrator → Mechanism ⇄ World (per step) → ScriptOutput
//! ```
//!
//! ### Stage 1: Compilation
//!
//! The [`script`] module cleans the text and classifies each line. Parameter
//! lines go to [`parameters`], `@variables` to [`variables`], `@phase`
//! blocks to [`phase`]. A `@run` takes a snapshot of the parameters in
//! effect ([`parameters::RunParameters`]) and binds it to its phases.
//!
//! ### Stage 2: Expressions
//!
//! Stop conditions, guards and variable values are small expressions. They
//! are tokenized by [`tokenizer`], parsed by the combinators in [`analyzer`]
//! into an [`ast::Expression`] and evaluated by [`eval`].
//!
//! ### Stage 3: Execution
//!
//! [`run::Run`] executes one subject at a time per worker: the [`world`]
//! produces the next stimulus from the previous response, the
//! [`mechanism`] learns and responds. Subjects after the first run on a
//! bounded pool of blocking tasks.
//!
//! ### Stage 4: Output
//!
//! [`output::ScriptOutput`] holds the recorded history and value series of
//! every subject; [`output::ScriptOutput::vwpn_eval`] reconstructs `v`, `w`,
//! `vss`, `p` and `n` series from it for plotting and export.

pub mod analyzer;
pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod mechanism;
pub mod output;
pub mod parameters;
pub mod phase;
pub mod progress;
pub mod run;
pub mod script;
pub mod tokenizer;
pub mod variables;
pub mod world;

// Re-exports
pub use config::SimulationConfig;
pub use error::*;
pub use mechanism::MechanismKind;
pub use output::{EvalKind, RunOutput, RunOutputSubject, ScriptOutput, Series};
pub use progress::{ProgressReporter, SilentReporter};
pub use script::{CompileError, Script};
