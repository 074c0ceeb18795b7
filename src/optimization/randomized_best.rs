use std::{
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use colored::Colorize;
use crossbeam_utils::thread;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{attempt, ScoredSchedule, SearchOutcome};
use crate::{config::SolverConfig, model::Model};

/// best schedule found so far, shared by all workers
///
/// the score is mirrored in an atomic so most losing candidates never take the lock
struct Incumbent {
    best: Mutex<Option<ScoredSchedule>>,
    best_score: AtomicI64,
}

impl Incumbent {
    fn new() -> Self {
        Self {
            best: Mutex::new(None),
            best_score: AtomicI64::new(i64::MIN),
        }
    }

    /// replaces the incumbent only on a strictly greater score, returns whether it did
    fn try_update(&self, candidate: ScoredSchedule) -> bool {
        let best_score = self.best_score.load(Ordering::Acquire);
        if best_score != i64::MIN && candidate.score <= best_score {
            return false;
        }

        let mut best = self.best.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let improves = match best.as_ref() {
            Some(current) => candidate.score > current.score,
            None => true,
        };
        if improves {
            self.best_score.store(candidate.score, Ordering::Release);
            *best = Some(candidate);
        }

        improves
    }

    fn into_inner(self) -> Option<ScoredSchedule> {
        self.best
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// counters shared by all workers
#[derive(Default)]
struct Counters {
    attempts: AtomicU64,     // attempts whose result was considered
    successes: AtomicU64,
    late_results: AtomicU64, // finished after budget + grace, not in `attempts`
}

impl Counters {
    fn into_outcome(self, best: Option<ScoredSchedule>, elapsed: Duration) -> SearchOutcome {
        SearchOutcome {
            best,
            attempts: self.attempts.into_inner(),
            successes: self.successes.into_inner(),
            late_results: self.late_results.into_inner(),
            elapsed,
        }
    }
}

/// in each iteration generate a random complete schedule
///
/// if it scores better than the current best -> replace current best.
/// runs until the time budget is spent (or `max_attempts` were started), on
/// `n_search_threads` workers that share the incumbent.
/// attempts finishing after budget + grace are thrown away.
pub fn search(model: &Model, config: &SolverConfig) -> SearchOutcome {
    let start = Instant::now();
    let deadline = start + config.budget();
    let hard_deadline = deadline + config.grace();

    let base_seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());

    let incumbent = Arc::new(Incumbent::new());
    let counters = Arc::new(Counters::default());

    tracing::info!(
        "searching with {} thread(s) for {}s (seed={}, max_attempts={:?})",
        config.n_search_threads,
        config.budget_secs,
        base_seed,
        config.max_attempts
    );

    let scope_result = thread::scope(|s| {
        for worker in 0..config.n_search_threads {
            let incumbent = Arc::clone(&incumbent);
            let counters = Arc::clone(&counters);

            s.spawn(move |_| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(worker as u64));
                run_worker(
                    model,
                    config,
                    worker,
                    &mut rng,
                    deadline,
                    hard_deadline,
                    &incumbent,
                    &counters,
                );
            });
        }
    });

    if let Err(panic) = scope_result {
        std::panic::resume_unwind(panic);
    }

    let best = match Arc::try_unwrap(incumbent) {
        Ok(incumbent) => incumbent.into_inner(),
        Err(shared) => shared
            .best
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone(),
    };
    let counters = Arc::try_unwrap(counters).unwrap_or_else(|shared| Counters {
        attempts: AtomicU64::new(shared.attempts.load(Ordering::SeqCst)),
        successes: AtomicU64::new(shared.successes.load(Ordering::SeqCst)),
        late_results: AtomicU64::new(shared.late_results.load(Ordering::SeqCst)),
    });
    let outcome = counters.into_outcome(best, start.elapsed());

    let done = format!(
        "search done in {}ms: {} attempt(s), {} success(es), {} late",
        outcome.elapsed.as_millis(),
        outcome.attempts,
        outcome.successes,
        outcome.late_results
    );
    match outcome.best.as_ref() {
        Some(best) => tracing::info!("{} -> best score={}", done, best.score.to_string().green()),
        None => tracing::warn!("{} -> {}", done, "no complete schedule".red()),
    }

    outcome
}

/// attempt loop of one worker
///
/// no attempt is started at or after `deadline`, an attempt finishing after
/// `hard_deadline` is discarded and ends the worker
#[allow(clippy::too_many_arguments)]
fn run_worker<R: Rng + ?Sized>(
    model: &Model,
    config: &SolverConfig,
    worker: usize,
    rng: &mut R,
    deadline: Instant,
    hard_deadline: Instant,
    incumbent: &Incumbent,
    counters: &Counters,
) {
    loop {
        if Instant::now() >= deadline {
            break;
        }

        // claim a ticket, give it back if the cap is reached
        let ticket = counters.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(max_attempts) = config.max_attempts {
            if ticket >= max_attempts {
                counters.attempts.fetch_sub(1, Ordering::SeqCst);
                break;
            }
        }

        let result = attempt(model, config, rng);

        if Instant::now() > hard_deadline {
            counters.attempts.fetch_sub(1, Ordering::SeqCst);
            counters.late_results.fetch_add(1, Ordering::SeqCst);
            tracing::warn!("[worker={}]: attempt {} finished after grace period, discarded", worker, ticket);
            break;
        }

        if let Some(schedule) = result {
            counters.successes.fetch_add(1, Ordering::SeqCst);
            let score = schedule.score(model);

            if incumbent.try_update(ScoredSchedule { schedule, score }) {
                tracing::debug!("[worker={}]: attempt {} -> new best score={}", worker, ticket, score);
            }
        }
    }
}
