//! Long-running background task that purges expired admin sessions and,
//! when enabled, moves raffles along their lifecycle as dates pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use raffle_core::lifecycle::scheduled_status;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::AppState;
use crate::errors::Result;

/// What one sweep changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_purged: usize,
    pub raffles_advanced: usize,
    /// Raffles whose due status change was refused; retried next sweep.
    pub raffles_failed: usize,
}

/// Run the sweep loop until `cancel` fires.
pub async fn run(state: Arc<AppState>, cancel: CancellationToken) {
    let interval = Duration::from_secs(state.config.sweep_interval_secs.max(1));
    info!(
        "Sweeper starting: every {}s, auto-advance {}",
        interval.as_secs(),
        if state.config.auto_advance_status { "on" } else { "off" }
    );

    loop {
        match sweep_once(&state, Utc::now().date_naive()).await {
            Ok(report) if report != SweepReport::default() => {
                info!(
                    "Sweep: {} sessions purged, {} raffles advanced, {} failed",
                    report.sessions_purged, report.raffles_advanced, report.raffles_failed
                );
            }
            Ok(_) => {}
            Err(e) => error!("Sweep error: {e}"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Sweeper stopped");
}

/// Perform a single sweep as of `today`.
pub async fn sweep_once(state: &AppState, today: NaiveDate) -> Result<SweepReport> {
    let mut report = SweepReport {
        sessions_purged: state.sessions.purge_expired(Utc::now()).await,
        ..SweepReport::default()
    };

    if !state.config.auto_advance_status {
        return Ok(report);
    }

    for mut raffle in state.store.list_raffles().await? {
        // upcoming past its draw date needs two steps
        while let Some(next) = scheduled_status(&raffle, today) {
            match state.store.set_raffle_status(&raffle.id, next).await {
                Ok(updated) => {
                    info!("Raffle {} moved from {} to {next}", raffle.id, raffle.status);
                    raffle = updated;
                    report.raffles_advanced += 1;
                }
                Err(e) => {
                    error!("Could not move raffle {} to {next}: {e}", raffle.id);
                    report.raffles_failed += 1;
                    break;
                }
            }
        }
    }

    Ok(report)
}
