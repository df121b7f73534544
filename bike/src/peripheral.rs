pub mod gpsd;
pub mod ssd1306;
pub mod uart;
