use std::env;

use anyhow::Context;
use bike::{
    config::BikeConfig,
    peripheral::{gpsd::Gpsd, ssd1306::Ssd1306, uart::UartLink},
    systems::{
        display::{self, Style},
        gps::{self, FixSlot},
        link::{self, LinkController},
    },
    track_log::TrackLogger,
};
use common::{config::DeviceConfig, shutdown::Shutdown, slot::Slot, types::display::DisplayState};
use crossbeam::channel;
use tracing::{error, info, Level};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    info!("Starting bike computer");

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "bike_config.toml".to_owned());
    let config = BikeConfig::load(&config_path)?;
    let device = DeviceConfig::load(&config.device_config)?;

    let shutdown = Shutdown::install()?;

    if let Some(launch) = &config.gps.launch {
        Gpsd::launch(launch).context("Launch gpsd")?;
    }

    info!("---------- Checking components ----------");
    let serial = UartLink::open(&config.serial)
        .context("Serial link to the microcontroller not found, reconnect it and restart")?;
    let oled = Ssd1306::new(config.display.i2c_bus, config.display.address)
        .context("OLED not found, reconnect it and restart")?;
    let gpsd =
        Gpsd::connect(&config.gps.address, config.gps.read_timeout()).context("Connect to gpsd")?;
    info!("-----------------------------------------");

    let fixes = FixSlot::default();
    let states = Slot::new(DisplayState::idle(device.unit));
    let (faults_tx, faults_rx) = channel::bounded(1);

    let gps_thread = gps::start_gps_thread(gpsd, fixes.clone(), shutdown.clone())?;
    let display_thread = display::start_display_thread(
        oled,
        states.clone(),
        Style::from(&device),
        config.display.refresh_hz,
        shutdown.clone(),
        faults_tx,
    )?;

    let mut controller = LinkController::new(
        serial,
        device,
        fixes,
        states,
        TrackLogger::new(&config.tracking_dir),
        config.gps.stale_after(),
    );
    let rst = link::run(&mut controller, &shutdown, &faults_rx, config.link.tick());

    shutdown.request();
    for (name, thread) in [("GPS", gps_thread), ("Display", display_thread)] {
        if thread.join().is_err() {
            error!("{name} thread panicked");
        }
    }

    match &rst {
        Ok(()) => info!("Bike computer stopped"),
        Err(err) => error!("Bike computer stopped: {err:?}"),
    }

    rst
}
