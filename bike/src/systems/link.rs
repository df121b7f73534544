use std::time::{Duration, Instant};

use anyhow::Context;
use common::{
    config::DeviceConfig,
    error::ProtocolError,
    protocol::{GpsPayload, InboundFrame, LineFramer, OutboundFrame, Request, Telemetry},
    shutdown::Shutdown,
    slot::Slot,
    ticker::Ticker,
    types::{
        display::DisplayState,
        gps::{FixMode, ValidFix},
        tracking::{Fault, Leds},
        units::MetersPerSecond,
    },
    tz,
};
use chrono::{Datelike, NaiveDateTime, Timelike};
use crossbeam::channel::{Receiver, TryRecvError};
use tracing::{debug, error, info, warn};

use crate::{
    systems::gps::FixSlot,
    track_log::TrackLogger,
    tracking::{Buttons, Presses, TrackFix, Tracker},
};

/// Byte stream to the microcontroller
pub trait SerialPort {
    /// Bytes that can be read without blocking
    fn bytes_available(&mut self) -> anyhow::Result<usize>;
    fn read_bytes(&mut self, buffer: &mut [u8]) -> anyhow::Result<usize>;
    fn write_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()>;
}

/// Owns the tracking state and answers the microcontroller
#[derive(Debug)]
pub struct LinkController<S> {
    serial: S,
    framer: LineFramer,

    config: DeviceConfig,
    fixes: FixSlot,
    display: Slot<DisplayState>,
    stale_after: Duration,

    tracker: Tracker,
    logger: TrackLogger,
    buttons: Buttons,
}

impl<S: SerialPort> LinkController<S> {
    pub fn new(
        serial: S,
        config: DeviceConfig,
        fixes: FixSlot,
        display: Slot<DisplayState>,
        logger: TrackLogger,
        stale_after: Duration,
    ) -> Self {
        Self {
            serial,
            framer: LineFramer::default(),
            config,
            fixes,
            display,
            stale_after,
            tracker: Tracker::default(),
            logger,
            buttons: Buttons::default(),
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn logger(&self) -> &TrackLogger {
        &self.logger
    }

    /// One poll of the link.
    ///
    /// Serial errors are returned, everything else is logged and the tick
    /// carries on.
    pub fn tick(&mut self, now: Instant) -> anyhow::Result<()> {
        let frame = self.poll_frame()?;

        let (buttons, presses) = match frame {
            Some(frame) => {
                let buttons = Buttons {
                    track: frame.button1,
                    pause: frame.button2,
                };

                (buttons, self.buttons.presses(buttons))
            }
            None => (self.buttons, Presses::default()),
        };

        let fix = self
            .fixes
            .latest()
            .and_then(|stamped| stamped.fresh(now, self.stale_after));
        let local_time = fix.map(|fix| tz::localize_in(fix.time, self.config.zone()).naive_local());

        let track_fix = fix.zip(local_time).map(|(fix, local_time)| TrackFix {
            position: fix.position,
            local_time,
        });

        for action in self.tracker.update(presses, track_fix, now) {
            if let Err(err) = self.logger.apply(&action) {
                error!("Track log {action:?} failed, ride path will be incomplete: {err:?}");
            }
        }

        self.publish_display(fix, local_time);

        if let Some(request) = frame.and_then(|frame| frame.request) {
            let reply = self.reply(request, buttons, fix, local_time)?;
            let line = reply.encode().context("Encode reply")?;

            self.serial
                .write_bytes(line.as_bytes())
                .context("Write reply")?;
        }

        self.buttons = buttons;

        Ok(())
    }

    /// Closes the open track file, if any
    pub fn finish(&mut self) {
        self.logger.finish();
    }

    /// Next well formed frame, reading whatever the port has buffered
    fn poll_frame(&mut self) -> anyhow::Result<Option<InboundFrame>> {
        let mut available = self
            .serial
            .bytes_available()
            .context("Check serial input")?;

        let mut buffer = [0; 256];
        while available > 0 {
            let len = available.min(buffer.len());
            let read = self
                .serial
                .read_bytes(&mut buffer[..len])
                .context("Read serial")?;
            if read == 0 {
                break;
            }

            self.framer.push(&buffer[..read]);
            available = available.saturating_sub(read);
        }

        while let Some(line) = self.framer.next_line() {
            let frame = line.and_then(|line| InboundFrame::decode(&line));

            match frame {
                Ok(frame) => return Ok(Some(frame)),
                Err(ProtocolError::Empty) => {}
                Err(err) => warn!("Ignoring inbound line: {err}"),
            }
        }

        Ok(None)
    }

    fn publish_display(&self, fix: Option<ValidFix>, local_time: Option<NaiveDateTime>) {
        let previous = self.display.latest();

        let state = DisplayState {
            speed: fix.map(|fix| fix.speed).unwrap_or(MetersPerSecond(0.0)),
            unit: self.config.unit,
            // The clock freezes at the last fix
            datetime: local_time.unwrap_or(previous.datetime),
            mode: fix.map(|fix| fix.mode).unwrap_or(FixMode::NoFix),
            track: self.tracker.state(),
        };

        self.display.publish(state);
    }

    fn reply(
        &self,
        request: Request,
        buttons: Buttons,
        fix: Option<ValidFix>,
        local_time: Option<NaiveDateTime>,
    ) -> anyhow::Result<OutboundFrame> {
        let reply = match request {
            Request::Config => {
                debug!("Sending device config");

                OutboundFrame::Config(self.config.wire_payload().context("Build config")?)
            }
            Request::Telemetry => {
                let gps = match fix.zip(local_time) {
                    Some((fix, time)) => GpsPayload::Fix(
                        fix.position.latitude,
                        fix.position.longitude,
                        self.config.unit.convert(fix.speed),
                        time.month(),
                        time.day(),
                        time.hour(),
                        time.minute(),
                    ),
                    None => GpsPayload::NO_FIX,
                };
                let fault = if fix.is_some() {
                    Fault::Ok
                } else {
                    Fault::NoFix
                };

                OutboundFrame::Telemetry(Telemetry {
                    gps,
                    led: Leds(self.tracker.state(), fault),
                    button1_ack: buttons.track,
                    button2_ack: buttons.pause,
                })
            }
        };

        Ok(reply)
    }
}

/// Ticks the controller until shutdown or a fault from another thread
pub fn run<S: SerialPort>(
    controller: &mut LinkController<S>,
    shutdown: &Shutdown,
    faults: &Receiver<anyhow::Error>,
    interval: Duration,
) -> anyhow::Result<()> {
    let mut ticker = Ticker::new(interval);

    let rst = loop {
        match faults.try_recv() {
            Ok(fault) => break Err(fault),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
        }

        if shutdown.requested() {
            break Ok(());
        }

        if let Err(err) = controller.tick(Instant::now()) {
            break Err(err.context("Serial link"));
        }

        ticker.wait();
    };

    controller.finish();
    info!("Link loop stopped");

    rst
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use chrono::{TimeZone, Utc};
    use common::types::gps::{GpsFix, Position, StampedFix};
    use crossbeam::channel;

    use super::*;

    #[derive(Debug, Default)]
    struct Loopback {
        inbound: VecDeque<u8>,
        outbound: Vec<u8>,
    }

    impl SerialPort for Loopback {
        fn bytes_available(&mut self) -> anyhow::Result<usize> {
            Ok(self.inbound.len())
        }

        fn read_bytes(&mut self, buffer: &mut [u8]) -> anyhow::Result<usize> {
            let len = buffer.len().min(self.inbound.len());
            for (slot, byte) in buffer.iter_mut().zip(self.inbound.drain(..len)) {
                *slot = byte;
            }

            Ok(len)
        }

        fn write_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
            self.outbound.extend_from_slice(bytes);
            Ok(())
        }
    }

    fn config() -> DeviceConfig {
        DeviceConfig::from_json(r#"{"UNT":2,"DTM":0,"24H":1,"TMZ":"UTC","BRT":4}"#).unwrap()
    }

    fn controller(dir: &std::path::Path) -> LinkController<Loopback> {
        LinkController::new(
            Loopback::default(),
            config(),
            FixSlot::default(),
            Slot::new(DisplayState::idle(config().unit)),
            TrackLogger::new(dir),
            Duration::from_secs(5),
        )
    }

    fn send(controller: &mut LinkController<Loopback>, line: &str) {
        controller.serial.inbound.extend(line.bytes());
    }

    fn take_output(controller: &mut LinkController<Loopback>) -> String {
        String::from_utf8(std::mem::take(&mut controller.serial.outbound)).unwrap()
    }

    #[test]
    fn one_frame_per_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path());

        send(&mut controller, "{\"REQ\":1}\n{\"REQ\":0}\n");

        let now = Instant::now();
        controller.tick(now).unwrap();
        assert!(take_output(&mut controller).starts_with("{\"GPS\""));

        controller.tick(now).unwrap();
        assert_eq!(take_output(&mut controller), "{\"BRT\":4,\"DTM\":0,\"UNT\":2}\n");

        controller.tick(now).unwrap();
        assert_eq!(take_output(&mut controller), "");
    }

    #[test]
    fn frame_split_across_reads() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path());

        send(&mut controller, "{\"BUTTON2\":true,");
        controller.tick(Instant::now()).unwrap();
        assert_eq!(take_output(&mut controller), "");

        send(&mut controller, "\"REQ\":1}\r\n");
        controller.tick(Instant::now()).unwrap();
        assert_eq!(
            take_output(&mut controller),
            "{\"GPS\":[-1,-1,-1,-1,-1,-1],\"LED\":[0,2],\"B1RCV\":false,\"B2RCV\":true}\n"
        );
    }

    #[test]
    fn display_follows_the_fix() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path());
        let fix = GpsFix {
            mode: FixMode::Fix2d,
            position: Some(Position {
                latitude: 1.0,
                longitude: 2.0,
            }),
            speed: MetersPerSecond(4.5),
            time: Some(Utc.timestamp_opt(86_400, 0).unwrap()),
        };

        let now = Instant::now();
        controller
            .fixes
            .publish(Some(StampedFix::new(fix, now)));
        controller.tick(now).unwrap();

        let state = controller.display.latest();
        assert_eq!(state.mode, FixMode::Fix2d);
        assert_eq!(state.speed, MetersPerSecond(4.5));
        assert_eq!(state.datetime.to_string(), "1970-01-02 00:00:00");

        // Stale fixes blank the speed but keep the last time
        controller.tick(now + Duration::from_secs(6)).unwrap();

        let state = controller.display.latest();
        assert_eq!(state.mode, FixMode::NoFix);
        assert_eq!(state.speed, MetersPerSecond(0.0));
        assert_eq!(state.datetime.to_string(), "1970-01-02 00:00:00");
    }

    #[test]
    fn fault_ends_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path());
        let (tx, rx) = channel::bounded(1);

        tx.send(anyhow::anyhow!("OLED disconnected")).unwrap();

        let rst = run(
            &mut controller,
            &Shutdown::default(),
            &rx,
            Duration::from_millis(1),
        );

        assert_eq!(rst.unwrap_err().to_string(), "OLED disconnected");
    }

    #[test]
    fn shutdown_ends_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path());
        let (_tx, rx) = channel::bounded(1);
        let shutdown = Shutdown::default();
        shutdown.request();

        run(&mut controller, &shutdown, &rx, Duration::from_millis(1)).unwrap();
    }
}
