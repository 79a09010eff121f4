//! Background task that narrates the simulation's event stream into the
//! log: hours at `debug`, game over at `info`.

use providence_core::simulation::SimulationEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn the monitor on `events`. The task ends when the channel closes.
pub fn spawn_monitor(mut events: broadcast::Receiver<SimulationEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => narrate(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event monitor lagged, skipping ahead");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Event monitor stopped");
    })
}

fn narrate(event: &SimulationEvent) {
    match event {
        SimulationEvent::HourChanged { day, hour } => {
            debug!(day, hour, "Hour advanced");
        }
        SimulationEvent::DayScheduleInstalled { day, origin } => {
            debug!(day, ?origin, "Day schedule installed");
        }
        SimulationEvent::Terminal {
            outcome,
            global_faith,
        } => {
            info!(?outcome, global_faith, "Game over");
        }
        SimulationEvent::StateChanged { .. }
        | SimulationEvent::DayChanged { .. }
        | SimulationEvent::OracleCompleted { .. }
        | SimulationEvent::ClockStatusChanged { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use providence_core::store::TerminalOutcome;

    use super::*;

    #[tokio::test]
    async fn monitor_stops_when_channel_closes() {
        let (tx, rx) = broadcast::channel(8);
        let handle = spawn_monitor(rx);
        tx.send(SimulationEvent::HourChanged { day: 1, hour: 7 }).ok();
        tx.send(SimulationEvent::Terminal {
            outcome: TerminalOutcome::Victory,
            global_faith: 100,
        })
        .ok();
        drop(tx);
        assert!(handle.await.is_ok());
    }
}
