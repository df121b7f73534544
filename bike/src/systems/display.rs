use std::thread::{self, JoinHandle};

use anyhow::Context;
use common::{
    config::{ClockFormat, DateOrder, DeviceConfig},
    shutdown::Shutdown,
    slot::Slot,
    ticker::Ticker,
    types::display::DisplayState,
};
use crossbeam::channel::Sender;
use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10},
        MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use tracing::{error, info, span, warn, Level};

use crate::peripheral::ssd1306::FrameBuffer;

/// A screen that takes whole frames
pub trait Display {
    fn clear(&mut self) -> anyhow::Result<()>;
    fn draw(&mut self, frame: &FrameBuffer) -> anyhow::Result<()>;
    fn present(&mut self) -> anyhow::Result<()>;
}

/// Date and clock preferences from the device config
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Style {
    pub date_order: DateOrder,
    pub clock: ClockFormat,
}

impl From<&DeviceConfig> for Style {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            date_order: config.date_order,
            clock: config.clock,
        }
    }
}

impl Style {
    fn datetime_format(&self) -> String {
        format!("{} {}", self.date_order.format(), self.clock.format())
    }

    /// The 24 hour clock is narrower, so it sits further right
    fn datetime_x(&self) -> i32 {
        match self.clock {
            ClockFormat::TwelveHour => 30,
            ClockFormat::TwentyFourHour => 40,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Font {
    Small,
    Large,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub font: Font,
}

impl Label {
    fn new(text: impl Into<String>, x: i32, y: i32, font: Font) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            font,
        }
    }
}

/// Mode, date and time, speed, unit, track glyph
pub fn layout(state: &DisplayState, style: Style) -> [Label; 5] {
    let datetime = state.datetime.format(&style.datetime_format()).to_string();

    [
        Label::new(format!("M:{}", state.mode.glyph()), 0, 0, Font::Small),
        Label::new(datetime, style.datetime_x(), 0, Font::Small),
        Label::new(
            state.unit.convert(state.speed).to_string(),
            0,
            16,
            Font::Large,
        ),
        Label::new(state.unit.label(), 84, 16, Font::Small),
        Label::new(state.track.glyph(), 84, 48, Font::Small),
    ]
}

pub fn render(labels: &[Label]) -> FrameBuffer {
    let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    let large = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);

    let mut frame = FrameBuffer::new();

    for label in labels {
        let style = match label.font {
            Font::Small => small,
            Font::Large => large,
        };

        let drawn = Text::with_baseline(
            &label.text,
            Point::new(label.x, label.y),
            style,
            Baseline::Top,
        )
        .draw(&mut frame);

        // Drawing into the frame buffer cannot fail
        if let Err(never) = drawn {
            match never {}
        }
    }

    frame
}

pub fn start_display_thread<D>(
    display: D,
    states: Slot<DisplayState>,
    style: Style,
    refresh_hz: f64,
    shutdown: Shutdown,
    faults: Sender<anyhow::Error>,
) -> anyhow::Result<JoinHandle<()>>
where
    D: Display + Send + 'static,
{
    thread::Builder::new()
        .name("Display Thread".to_owned())
        .spawn(move || {
            let _span = span!(Level::INFO, "Display thread").entered();

            let mut ticker = Ticker::from_hz(refresh_hz);
            let rst = render_loop(display, &states, style, &mut ticker, &shutdown);

            if let Err(err) = rst {
                error!("Display failed: {err:?}");

                // Fault first, the link loop checks for it once it sees the shutdown
                if faults.send(err.context("OLED disconnected")).is_err() {
                    warn!("Link loop already gone, display fault dropped");
                }
                shutdown.request();
            }
        })
        .context("Spawn thread")
}

/// Redraws the latest state every tick until shutdown, then blanks the screen
pub fn render_loop(
    mut display: impl Display,
    states: &Slot<DisplayState>,
    style: Style,
    ticker: &mut Ticker,
    shutdown: &Shutdown,
) -> anyhow::Result<()> {
    while !shutdown.requested() {
        let state = states.latest();
        let frame = render(&layout(&state, style));

        display.draw(&frame).context("Draw frame")?;
        display.present().context("Present frame")?;

        ticker.wait();
    }

    info!("Clearing display");
    display.clear().context("Clear display")?;
    display.present().context("Present blank frame")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::bail;
    use chrono::NaiveDate;
    use common::types::{
        gps::FixMode,
        tracking::TrackingState,
        units::{MetersPerSecond, SpeedUnit},
    };
    use crossbeam::channel;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Clear,
        Draw(usize),
        Present,
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_after: Option<usize>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&mut self, call: Call) -> anyhow::Result<()> {
            let mut calls = self.calls.lock().unwrap();
            if self.fail_after.is_some_and(|limit| calls.len() >= limit) {
                bail!("I2C write failed");
            }

            calls.push(call);
            Ok(())
        }
    }

    impl Display for Recorder {
        fn clear(&mut self) -> anyhow::Result<()> {
            self.record(Call::Clear)
        }

        fn draw(&mut self, frame: &FrameBuffer) -> anyhow::Result<()> {
            self.record(Call::Draw(frame.lit()))
        }

        fn present(&mut self) -> anyhow::Result<()> {
            self.record(Call::Present)
        }
    }

    fn riding() -> DisplayState {
        DisplayState {
            speed: MetersPerSecond(10.0),
            unit: SpeedUnit::Kmh,
            datetime: NaiveDate::from_ymd_opt(2021, 5, 1)
                .unwrap()
                .and_hms_opt(15, 4, 0)
                .unwrap(),
            mode: FixMode::Fix3d,
            track: TrackingState::Tracking,
        }
    }

    fn texts(labels: &[Label]) -> Vec<&str> {
        labels.iter().map(|label| label.text.as_str()).collect()
    }

    #[test]
    fn twelve_hour_month_first() {
        let labels = layout(&riding(), Style::default());

        assert_eq!(
            texts(&labels),
            ["M:3", "05/01 03:04PM", "36", "km/h", "T"]
        );
        assert_eq!((labels[1].x, labels[1].y), (30, 0));
        assert_eq!(labels[2].font, Font::Large);
        assert_eq!((labels[4].x, labels[4].y), (84, 48));
    }

    #[test]
    fn twenty_four_hour_day_first() {
        let style = Style {
            date_order: DateOrder::DayFirst,
            clock: ClockFormat::TwentyFourHour,
        };

        let labels = layout(&riding(), style);

        assert_eq!(labels[1].text, "01-05 15:04");
        assert_eq!(labels[1].x, 40);
    }

    #[test]
    fn idle_screen() {
        let labels = layout(&DisplayState::idle(SpeedUnit::Mph), Style::default());

        assert_eq!(texts(&labels), ["M:D", "01/01 12:00AM", "0", "mph", ""]);
    }

    #[test]
    fn render_draws_text() {
        let labels = layout(&riding(), Style::default());

        let frame = render(&labels);

        assert!(frame.lit() > 0);
        assert_eq!(render(&[]).lit(), 0);
    }

    #[test]
    fn clears_screen_on_shutdown() {
        let display = Recorder::default();
        let shutdown = Shutdown::default();
        shutdown.request();

        render_loop(
            display.clone(),
            &Slot::new(riding()),
            Style::default(),
            &mut Ticker::new(Duration::from_millis(1)),
            &shutdown,
        )
        .unwrap();

        assert_eq!(display.calls(), [Call::Clear, Call::Present]);
    }

    #[test]
    fn device_failure_stops_the_process() {
        let display = Recorder {
            fail_after: Some(3),
            ..Default::default()
        };
        let shutdown = Shutdown::default();
        let (tx, rx) = channel::bounded(1);

        let handle = start_display_thread(
            display.clone(),
            Slot::new(riding()),
            Style::default(),
            200.0,
            shutdown.clone(),
            tx,
        )
        .unwrap();
        handle.join().unwrap();

        assert!(shutdown.requested());
        let fault = rx.try_recv().expect("fault was reported");
        assert_eq!(fault.to_string(), "OLED disconnected");

        let calls = display.calls();
        assert!(matches!(calls[..], [Call::Draw(_), Call::Present, Call::Draw(_)]));
    }
}
