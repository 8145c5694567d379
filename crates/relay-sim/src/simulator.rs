//! Relay simulator
//!
//! Drives a coalescer with synthetic user updates on a manual clock:
//! 1. Each round mutates every user's name and/or time zone
//! 2. The clock advances one tick
//! 3. Due jobs are executed (their payload logged on the `jobs` target)
//! 4. Held batches are re-evaluated
//!
//! Invariants checked:
//! - Every mutation is either dispatched or still pending
//! - Non-urgent jobs are spaced at least one rate-limit window apart

use crate::catalog::{random_name, TimeZoneCatalog};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use relay_core::{
    ChangeCoalescer, Clock, Evaluation, InMemoryQueue, JobId, ManualClock, RelayConfig,
    RelayError,
};
use relay_record::MutationEvent;
use relay_scheduler::FlushReason;
use relay_store::MemoryStore;
use serde::Serialize;
use std::sync::Arc;

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Synthetic users
    pub users: usize,
    /// Update rounds; every user changes once per round
    pub rounds: u64,
    /// Simulated seconds between rounds
    pub tick_secs: u64,
    /// Upper bound of unrelated outstanding jobs, re-rolled each round
    pub max_queue_depth: usize,
    /// Coalescer settings
    pub relay: RelayConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            users: 100,
            rounds: 20,
            tick_secs: 10,
            max_queue_depth: 0,
            relay: RelayConfig::default(),
        }
    }
}

/// Statistics for a simulation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimulatorStats {
    pub rounds: u64,
    pub mutations: u64,
    pub failed_triggers: u64,
    pub holds: u64,
    pub flushes: u64,
    pub urgent_flushes: u64,
    pub jobs_executed: u64,
    pub records_dispatched: u64,
    pub records_pending: u64,
}

/// An invariant broken during simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Dispatched plus pending does not account for every mutation
    LostRecords { mutations: u64, accounted: u64 },
    /// Non-urgent job scheduled inside the previous job's window
    WindowBreached {
        job_id: String,
        gap_secs: i64,
        window_secs: u64,
    },
}

/// Final report from simulator
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Relay Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Users: {}\n", self.config.users));
        report.push_str(&format!("Rounds: {}\n", self.stats.rounds));
        report.push_str(&format!("Mutations: {}\n", self.stats.mutations));
        report.push_str(&format!("Failed Triggers: {}\n", self.stats.failed_triggers));
        report.push_str(&format!("Holds: {}\n", self.stats.holds));
        report.push_str(&format!(
            "Flushes: {} ({} urgent)\n",
            self.stats.flushes, self.stats.urgent_flushes
        ));
        report.push_str(&format!("Jobs Executed: {}\n", self.stats.jobs_executed));
        report.push_str(&format!(
            "Records Dispatched: {}\n",
            self.stats.records_dispatched
        ));
        report.push_str(&format!("Records Pending: {}\n", self.stats.records_pending));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

/// Fixed start of simulated time
#[must_use]
pub fn simulation_epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0)
        .single()
        .unwrap_or_default()
}

/// Identity of the i-th synthetic user
#[must_use]
pub fn user_identity(i: usize) -> String {
    format!("subscriber{i}@example.com")
}

struct LastJob {
    job_id: JobId,
    not_before: DateTime<Utc>,
}

/// Run the Relay simulator
///
/// # Errors
/// `RelayError::Config` if `config.relay` does not validate
pub async fn run_simulator(config: SimulatorConfig) -> Result<SimulatorReport, RelayError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let clock = Arc::new(ManualClock::new(simulation_epoch()));
    let queue = Arc::new(InMemoryQueue::new("subscribers"));
    let coalescer =
        ChangeCoalescer::new(&config.relay, Arc::new(MemoryStore::new()), queue.clone())?
            .with_clock(clock.clone());

    let window_secs = config.relay.rate_limit_window_secs;
    let tick = Duration::seconds(i64::try_from(config.tick_secs).unwrap_or(i64::MAX));

    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();
    let mut last_job: Option<LastJob> = None;

    for round in 0..config.rounds {
        let depth = if config.max_queue_depth == 0 {
            0
        } else {
            rng.gen_range(0..=config.max_queue_depth)
        };
        queue.set_background_depth(depth);
        tracing::debug!(round, background_depth = depth, "round started");

        for user in 0..config.users {
            let event = random_update(&mut rng, &user_identity(user));
            stats.mutations += 1;

            match coalescer.on_mutation(&event).await {
                Ok(outcome) => account(
                    &outcome.evaluation,
                    &mut stats,
                    &mut last_job,
                    &mut violations,
                    window_secs,
                ),
                Err(e) => {
                    stats.failed_triggers += 1;
                    tracing::warn!(round, user, "trigger failed: {}", e);
                }
            }
        }

        clock.advance(tick);
        execute_due(&queue, clock.as_ref(), &mut stats);

        // Timer-driven re-evaluation so held batches go out without new writes
        match coalescer.evaluate().await {
            Ok(evaluation) => account(
                &evaluation,
                &mut stats,
                &mut last_job,
                &mut violations,
                window_secs,
            ),
            Err(e) => tracing::warn!(round, "re-evaluation failed: {}", e),
        }

        stats.rounds += 1;
    }

    stats.records_pending = coalescer.store().load_pending().await?.len() as u64;

    let accounted = stats.records_dispatched + stats.records_pending;
    if accounted != stats.mutations {
        violations.push(Violation::LostRecords {
            mutations: stats.mutations,
            accounted,
        });
    }

    Ok(SimulatorReport {
        config,
        stats,
        violations,
    })
}

fn random_update<R: Rng + ?Sized>(rng: &mut R, identity: &str) -> MutationEvent {
    let event = MutationEvent::new(identity);
    match rng.gen_range(0..4) {
        0 => event.with_change("name", random_name(rng)),
        1 => event.with_change("timezone", TimeZoneCatalog::choose(rng)),
        _ => event
            .with_change("name", random_name(rng))
            .with_change("timezone", TimeZoneCatalog::choose(rng)),
    }
}

fn account(
    evaluation: &Evaluation,
    stats: &mut SimulatorStats,
    last_job: &mut Option<LastJob>,
    violations: &mut Vec<Violation>,
    window_secs: u64,
) {
    let Some(flush) = &evaluation.flush else {
        if !evaluation.decision.should_flush() {
            stats.holds += 1;
        }
        return;
    };

    stats.flushes += 1;
    stats.records_dispatched += flush.job.record_count as u64;

    let urgent = matches!(
        flush.reason,
        FlushReason::UrgentBacklog { .. } | FlushReason::IdleQueue { urgent: true }
    );
    if urgent {
        stats.urgent_flushes += 1;
    } else if let Some(previous) = last_job.as_ref() {
        let gap = (flush.job.not_before - previous.not_before).num_seconds();
        if gap < i64::try_from(window_secs).unwrap_or(i64::MAX) {
            tracing::error!(
                job_id = %flush.job.job_id,
                previous = %previous.job_id,
                gap,
                "job scheduled inside rate-limit window"
            );
            violations.push(Violation::WindowBreached {
                job_id: flush.job.job_id.to_string(),
                gap_secs: gap,
                window_secs,
            });
        }
    }

    *last_job = Some(LastJob {
        job_id: flush.job.job_id,
        not_before: flush.job.not_before,
    });
}

fn execute_due(queue: &InMemoryQueue, clock: &ManualClock, stats: &mut SimulatorStats) {
    for scheduled in queue.take_due(clock.now()) {
        stats.jobs_executed += 1;
        match scheduled.job.payload_json() {
            Ok(payload) => tracing::info!(target: "jobs", job_id = %scheduled.job.id, "{}", payload),
            Err(e) => tracing::error!(target: "jobs", job_id = %scheduled.job.id, "payload encoding failed: {}", e),
        }
    }
}
