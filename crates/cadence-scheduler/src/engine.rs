use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::evaluator::Evaluator;
use crate::types::Firing;

/// Drives an [`Evaluator`] from the wall clock.
///
/// The clock is read here, at the edge of the system; the evaluator core
/// only ever sees the explicit `now` it is handed. Fired jobs are forwarded
/// to the dispatcher over mpsc without ever blocking the tick loop.
pub struct SchedulerEngine {
    evaluator: Evaluator,
    /// If set, every [`Firing`] is sent here for dispatch.
    fired_tx: Option<mpsc::Sender<Firing>>,
}

impl SchedulerEngine {
    pub fn new(evaluator: Evaluator, fired_tx: Option<mpsc::Sender<Firing>>) -> Self {
        Self {
            evaluator,
            fired_tx,
        }
    }

    /// Job table management between ticks, before `run` consumes the engine.
    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    /// Main event loop. Ticks every loop interval until `shutdown`
    /// broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let period = std::time::Duration::from_secs(
            self.evaluator.loop_interval().num_seconds().max(1) as u64,
        );
        info!(loop_interval_secs = period.as_secs(), "scheduler engine started");

        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.evaluator.eval(Utc::now()) {
                        Ok(firings) => {
                            for firing in firings {
                                info!(
                                    firing_id = %firing.id,
                                    job = %firing.name,
                                    function = %firing.function,
                                    "job fired"
                                );
                                if let Some(ref tx) = self.fired_tx {
                                    // try_send never blocks the tick loop.
                                    if tx.try_send(firing).is_err() {
                                        warn!("dispatch channel full or closed, firing dropped");
                                    }
                                }
                            }
                        }
                        Err(e) => error!("scheduler tick error: {e}"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{JobSpec, ScheduleConfig};

    #[tokio::test(start_paused = true)]
    async fn engine_forwards_firings_to_the_dispatch_channel() {
        let mut spec = JobSpec::new("test.ping");
        spec.seconds = Some(3600);
        spec.run_on_start = true;
        let mut schedule = ScheduleConfig::default();
        schedule.jobs.insert("boot".to_string(), spec);

        let (tx, mut rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = SchedulerEngine::new(Evaluator::new(schedule, 1), Some(tx));
        let handle = tokio::spawn(engine.run(shutdown_rx));

        let firing = rx.recv().await.expect("firing should arrive");
        assert_eq!(firing.name, "boot");
        assert_eq!(firing.function, "test.ping");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
