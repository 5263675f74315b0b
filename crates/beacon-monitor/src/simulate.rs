//! Simulated request workload.
//!
//! Spawns one tokio task per operation. A semaphore limits how many run at
//! once, mimicking a client connection pool; each running operation is
//! tracked by the loading manager for its whole lifetime.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::Duration;

use beacon_loading::LoadingManager;

use crate::error::{MonitorError, Result};

/// Shape of a simulated workload.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub operations: usize,
    pub concurrency: usize,
    pub min_ms: u64,
    pub max_ms: u64,
    /// Probability in `[0, 1]` that an operation fails.
    pub fail_rate: f64,
}

impl SimulationPlan {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(MonitorError::InvalidPlan(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.min_ms > self.max_ms {
            return Err(MonitorError::InvalidPlan(format!(
                "min-ms ({}) exceeds max-ms ({})",
                self.min_ms, self.max_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.fail_rate) {
            return Err(MonitorError::InvalidPlan(format!(
                "fail-rate {} is outside [0, 1]",
                self.fail_rate
            )));
        }
        Ok(())
    }

    /// Draw a duration and outcome for every operation up front.
    fn draw(&self) -> Vec<(Duration, bool)> {
        let mut rng = rand::rng();
        (0..self.operations)
            .map(|_| {
                let ms = rng.random_range(self.min_ms..=self.max_ms);
                let fails = rng.random_bool(self.fail_rate);
                (Duration::from_millis(ms), fails)
            })
            .collect()
    }
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SimulationSummary {
    pub operations: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

/// Run every operation of `plan` through `manager` and wait for all of them.
pub async fn run_simulation(
    manager: &LoadingManager,
    plan: &SimulationPlan,
) -> Result<SimulationSummary> {
    plan.validate()?;

    let start = Instant::now();
    let semaphore = Arc::new(Semaphore::new(plan.concurrency));
    let mut handles = Vec::with_capacity(plan.operations);

    for (id, (duration, fails)) in plan.draw().into_iter().enumerate() {
        let manager = manager.clone();
        let semaphore = semaphore.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| MonitorError::Internal("operation semaphore closed".to_string()))?;
            manager
                .track_future(simulated_operation(id, duration, fails))
                .await
        }));
    }

    tracing::info!(
        operations = plan.operations,
        concurrency = plan.concurrency,
        "Simulation started"
    );

    let mut failed = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Operation reported failure");
                failed += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "Operation task panicked");
                failed += 1;
            }
        }
    }

    let summary = SimulationSummary {
        operations: plan.operations,
        failed,
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    tracing::info!(
        operations = summary.operations,
        failed = summary.failed,
        elapsed_ms = summary.elapsed_ms,
        "Simulation complete"
    );

    Ok(summary)
}

async fn simulated_operation(id: usize, duration: Duration, fails: bool) -> Result<()> {
    tracing::trace!(operation = id, duration_ms = duration.as_millis(), "Operation running");
    tokio::time::sleep(duration).await;
    if fails {
        return Err(MonitorError::OperationFailed { id });
    }
    Ok(())
}
