use std::{
    thread::{self, JoinHandle},
    time::Instant,
};

use anyhow::Context;
use common::{
    error::ProtocolError,
    shutdown::Shutdown,
    slot::Slot,
    types::gps::{GpsFix, Report, StampedFix},
};
use tracing::{debug, error, span, trace, warn, Level};

/// Latest fix, `None` until gpsd has sent its first TPV
pub type FixSlot = Slot<Option<StampedFix>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpsRead {
    Line(String),
    /// Nothing arrived before the read timeout
    Pending,
    Closed,
}

/// Stream of gpsd JSON lines
pub trait GpsSource {
    fn read(&mut self) -> anyhow::Result<GpsRead>;
}

pub fn start_gps_thread<S>(
    source: S,
    fixes: FixSlot,
    shutdown: Shutdown,
) -> anyhow::Result<JoinHandle<()>>
where
    S: GpsSource + Send + 'static,
{
    thread::Builder::new()
        .name("GPS Thread".to_owned())
        .spawn(move || {
            let _span = span!(Level::INFO, "GPS thread").entered();

            ingest(source, &fixes, &shutdown);
        })
        .context("Spawn thread")
}

/// Publishes every TPV report until the stream ends or shutdown is requested
pub fn ingest(mut source: impl GpsSource, fixes: &FixSlot, shutdown: &Shutdown) {
    while !shutdown.requested() {
        let rst = source.read();

        match rst {
            Ok(GpsRead::Line(line)) => match Report::decode(&line) {
                Ok(Report::Tpv(tpv)) => {
                    let fix = GpsFix::from(&tpv);
                    trace!(?fix, "New fix");

                    fixes.publish(Some(StampedFix::new(fix, Instant::now())));
                }
                Ok(Report::Other) | Err(ProtocolError::Empty) => {}
                Err(err) => {
                    debug!("Discarding gpsd report: {err}");
                }
            },
            Ok(GpsRead::Pending) => {}
            Ok(GpsRead::Closed) => {
                warn!("gpsd has terminated, no more fixes");
                return;
            }
            Err(err) => {
                error!("Lost gpsd, no more fixes: {err:?}");
                return;
            }
        }
    }
}
