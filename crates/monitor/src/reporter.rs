//! Status reporter
//!
//! Owns the polling tick: enumerate on a blocking thread, apply the
//! snapshot to the state, then write one report line. A failed tick is
//! logged and the loop carries on with the next one.

use crate::state::{MonitorState, Snapshot};
use crate::usb::backend::DeviceSource;
use crate::usb::enumerator::DeviceEnumerator;
use protocol::{ProtocolError, StatusReport, write_report};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

/// Failure of one polling tick
#[derive(Debug, Error)]
pub enum TickError {
    #[error("Enumeration task failed: {0}")]
    Enumeration(#[from] JoinError),

    #[error("Failed to write status report: {0}")]
    Output(#[from] ProtocolError),
}

/// Periodic status reporter
pub struct Reporter<S> {
    enumerator: Arc<DeviceEnumerator<S>>,
    state: Arc<MonitorState>,
}

impl<S: DeviceSource + 'static> Reporter<S> {
    pub fn new(enumerator: DeviceEnumerator<S>, state: Arc<MonitorState>) -> Self {
        Self {
            enumerator: Arc::new(enumerator),
            state,
        }
    }

    pub fn state(&self) -> &Arc<MonitorState> {
        &self.state
    }

    /// Enumerate once on the blocking pool
    pub async fn snapshot(&self) -> Result<Snapshot, TickError> {
        let enumerator = self.enumerator.clone();
        Ok(tokio::task::spawn_blocking(move || enumerator.enumerate()).await?)
    }

    /// Run one tick and return the resulting report
    pub async fn tick(&self) -> Result<StatusReport, TickError> {
        let snapshot = self.snapshot().await?;
        let events = self.state.apply_snapshot(snapshot);
        debug!("Tick produced {} event(s)", events.len());
        Ok(self.state.report())
    }

    /// Run one tick and write its report line
    pub async fn emit<W: Write>(&self, writer: &mut W) -> Result<(), TickError> {
        let report = self.tick().await?;
        write_report(writer, &report)?;
        Ok(())
    }

    /// Emit a report every `interval`, forever
    pub async fn run<W: Write>(&self, interval: Duration, mut writer: W) {
        info!("Reporting every {:?}", interval);
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.emit(&mut writer).await {
                error!("Status tick failed: {}", e);
            }
        }
    }
}
