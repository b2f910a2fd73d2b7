//! # Run Orchestrator
//!
//! A [`Run`] binds the parameters in effect at its `@run` line to a phase
//! sequence and executes the learning loop for every subject:
//!
//! ```text
//! World::next_stimulus(previous response)
//!     └─▶ Mechanism::learn_and_respond(stimulus)
//!             └─▶ RunOutputSubject (history, value snapshots)
//! ```
//!
//! Subject 0 runs in the calling task so that evaluation errors surface
//! before anything is spawned. The other subjects run on blocking worker
//! tasks bounded by a semaphore; their results are collected in subject
//! order. Each subject draws from its own generator, seeded from the run's
//! base seed and the subject index, so a subject's trace does not depend on
//! how subjects are scheduled.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::{Error, InternalResult};
use crate::mechanism::{Mechanism, MechanismError};
use crate::output::{RunOutput, RunOutputSubject};
use crate::parameters::RunParameters;
use crate::progress::ProgressReporter;
use crate::variables::Variables;
use crate::world::{PhaseSlot, World};

/// Line label that, with `bind_trials: off`, suppresses learning.
const NEW_TRIAL: &str = "new_trial";

#[derive(Debug, Clone)]
pub struct Run {
    pub label: String,
    /// Position among the runs of the script.
    pub index: usize,
    pub parameters: Arc<RunParameters>,
    pub slots: Arc<Vec<PhaseSlot>>,
    pub variables: Variables,
    /// `random_seed` of the script, if set.
    pub random_seed: Option<u64>,
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl Run {
    pub fn n_subjects(&self) -> usize {
        self.parameters.n_subjects
    }

    /// `random_seed`, else the configured seed, else a fresh one.
    pub fn base_seed(&self, config: &SimulationConfig) -> u64 {
        self.random_seed
            .or(config.seed)
            .unwrap_or_else(|| rand::thread_rng().gen())
    }

    pub fn subject_seed(&self, base: u64, subject: usize) -> u64 {
        splitmix64(splitmix64(base ^ splitmix64(self.index as u64)) ^ subject as u64)
    }

    fn stimulus_ids(&self, stimulus: &[(String, f64)]) -> InternalResult<Vec<(usize, f64)>> {
        stimulus
            .iter()
            .map(|(name, intensity)| {
                self.parameters
                    .elements
                    .id(name)
                    .map(|id| (id, *intensity))
                    .ok_or_else(|| MechanismError::UnknownElement(name.clone()).into())
            })
            .collect()
    }

    /// Runs one subject start to finish.
    ///
    /// Returns [`Error::Interrupted`] as soon as `abort` is set or the
    /// reporter asks to stop; `abort` is then set for every other subject.
    pub fn run_subject(
        &self,
        subject: usize,
        seed: u64,
        reporter: &dyn ProgressReporter,
        abort: &AtomicBool,
        progress_interval: usize,
    ) -> InternalResult<RunOutputSubject> {
        let params = &self.parameters;
        let mut rng = StdRng::seed_from_u64(seed);
        let globals = self.variables.instantiate(&mut rng)?;
        let mut mechanism = Mechanism::new(Arc::clone(params));
        let mut world = World::new(Arc::clone(&self.slots));
        let mut out = RunOutputSubject::new();
        let all_elements: Vec<usize> = (0..params.elements.len()).collect();

        out.write_all(&mechanism, 0);
        let mut previous: Option<(Vec<(String, f64)>, Vec<usize>)> = None;
        let mut response: Option<String> = None;
        let mut step = 0;
        loop {
            if abort.load(Ordering::SeqCst) || reporter.stop_requested() {
                abort.store(true, Ordering::SeqCst);
                return Err(Error::Interrupted);
            }
            let Some(stimulus) = world.next_stimulus(response.as_deref(), &globals, &mut rng)?
            else {
                break;
            };

            let ids = self.stimulus_ids(&stimulus.stimulus)?;
            let new_trial = !params.bind_trials
                && std::iter::once(&stimulus.line_label)
                    .chain(&stimulus.help_lines_traversed)
                    .any(|l| l.eq_ignore_ascii_case(NEW_TRIAL));
            let previous_response = mechanism.response();
            let behavior =
                mechanism.learn_and_respond(&ids, stimulus.suppress_learning || new_trial, &mut rng)?;

            if let Some((previous_stimulus, previous_ids)) = previous.take() {
                let learned = if params.trace > 0.0 {
                    &all_elements
                } else {
                    &previous_ids
                };
                out.write_values(&mechanism, learned, previous_response, step);
                out.write_history(
                    &previous_stimulus,
                    previous_response.map(|b| params.behaviors.name(b)),
                );
            }
            out.write_phase(&stimulus.phase_label, step);
            out.write_line_labels(&stimulus.help_lines_traversed, &stimulus.line_label, step);

            response = behavior.map(|b| params.behaviors.name(b).to_string());
            previous = Some((stimulus.stimulus, ids.iter().map(|(e, _)| *e).collect()));
            step += 1;
            if progress_interval > 0 && step % progress_interval == 0 {
                reporter.report_status(&format!(
                    "Run '{}': subject {}, step {}",
                    self.label,
                    subject + 1,
                    step
                ));
            }
        }

        out.write_all(&mechanism, step);
        if let Some((last_stimulus, _)) = previous {
            out.write_history(&last_stimulus, response.as_deref());
        }
        debug!("subject {} of run '{}' done after {} steps", subject, self.label, step);
        Ok(out)
    }

    #[tracing::instrument(level = "debug", skip(self, config, reporter), fields(run = %self.label))]
    pub async fn execute(
        &self,
        config: &SimulationConfig,
        reporter: Arc<dyn ProgressReporter>,
    ) -> InternalResult<RunOutput> {
        let n = self.n_subjects();
        let base = self.base_seed(config);
        let interval = config.progress_interval;
        info!("run '{}' started with {} subject(s)", self.label, n);
        reporter.report_status(&format!("Running '{}'", self.label));

        let abort = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(AtomicUsize::new(0));
        let finish = move |reporter: &dyn ProgressReporter, completed: &AtomicUsize| {
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            reporter.report_progress(done as f64 / n as f64);
        };

        let first = self.run_subject(0, self.subject_seed(base, 0), reporter.as_ref(), &abort, interval)?;
        finish(reporter.as_ref(), &completed);
        let mut subjects = Vec::with_capacity(n);
        subjects.push(first);

        if !config.parallel {
            for subject in 1..n {
                let seed = self.subject_seed(base, subject);
                subjects.push(self.run_subject(subject, seed, reporter.as_ref(), &abort, interval)?);
                finish(reporter.as_ref(), &completed);
            }
        } else if n > 1 {
            let workers = config.worker_count(n);
            debug!("dispatching {} subject(s) to {} worker(s)", n - 1, workers);
            let semaphore = Arc::new(Semaphore::new(workers));
            let run = Arc::new(self.clone());

            let handles: Vec<_> = (1..n)
                .map(|subject| {
                    let run = Arc::clone(&run);
                    let reporter = Arc::clone(&reporter);
                    let abort = Arc::clone(&abort);
                    let completed = Arc::clone(&completed);
                    let semaphore = Arc::clone(&semaphore);
                    let seed = run.subject_seed(base, subject);
                    tokio::spawn(async move {
                        let _permit = semaphore
                            .acquire_owned()
                            .await
                            .map_err(|e| Error::internal(format!("worker pool closed: {}", e)))?;
                        tokio::task::spawn_blocking(move || -> InternalResult<RunOutputSubject> {
                            let out = run.run_subject(subject, seed, reporter.as_ref(), &abort, interval)?;
                            finish(reporter.as_ref(), &completed);
                            Ok(out)
                        })
                        .await
                        .map_err(|e| Error::internal(format!("worker failed: {}", e)))?
                    })
                })
                .collect();

            // 中断時は残りのワーカーを待たない
            let outputs = try_join_all(handles.into_iter().map(|handle| async move {
                handle
                    .await
                    .map_err(|e| Error::internal(format!("worker failed: {}", e)))?
            }))
            .await
            .inspect_err(|_| abort.store(true, Ordering::SeqCst))?;
            subjects.extend(outputs);
        }

        info!("run '{}' finished", self.label);
        Ok(RunOutput {
            label: self.label.clone(),
            parameters: Arc::clone(&self.parameters),
            subjects,
        })
    }
}
