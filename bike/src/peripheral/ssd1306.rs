use std::convert::Infallible;

use anyhow::Context;
use embedded_graphics::{pixelcolor::BinaryColor, prelude::*};
use rppal::i2c::I2c;
use tracing::instrument;

use crate::systems::display::Display;

pub const WIDTH: usize = 128;
pub const HEIGHT: usize = 64;
const PAGES: usize = HEIGHT / 8;

/// One bit per pixel, laid out in pages the way the SSD1306 expects
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer([u8; WIDTH * PAGES]);

impl FrameBuffer {
    pub fn new() -> Self {
        Self([0; WIDTH * PAGES])
    }

    pub fn clear(&mut self) {
        self.0.fill(0);
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= WIDTH || y >= HEIGHT {
            return false;
        }

        self.0[(y / 8) * WIDTH + x] & (1 << (y % 8)) != 0
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        if x >= WIDTH || y >= HEIGHT {
            return;
        }

        let byte = &mut self.0[(y / 8) * WIDTH + x];
        if on {
            *byte |= 1 << (y % 8);
        } else {
            *byte &= !(1 << (y % 8));
        }
    }

    pub fn lit(&self) -> usize {
        self.0.iter().map(|it| it.count_ones() as usize).sum()
    }

    pub fn to_slice(&self) -> &[u8] {
        &self.0
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("lit", &self.lit())
            .finish()
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }

            self.set_pixel(point.x as usize, point.y as usize, color.is_on());
        }

        Ok(())
    }
}

/// 128x64 OLED
pub struct Ssd1306 {
    i2c: I2c,
    buffer: FrameBuffer,
}

impl Ssd1306 {
    pub const I2C_BUS: u8 = 1;
    pub const I2C_ADDRESS: u16 = 0x3C;

    #[instrument(level = "debug")]
    pub fn new(bus: u8, address: u16) -> anyhow::Result<Self> {
        let mut i2c = I2c::with_bus(bus).context("Open i2c")?;

        i2c.set_slave_address(address)
            .context("Set address for SSD1306")?;

        let mut this = Self {
            i2c,
            buffer: FrameBuffer::new(),
        };

        this.initialize().context("Init SSD1306")?;
        this.present().context("Blank SSD1306")?;

        Ok(this)
    }
}

impl Ssd1306 {
    const CONTROL_COMMAND: u8 = 0x00;
    const CONTROL_DATA: u8 = 0x40;

    const CMD_DISPLAY_OFF: u8 = 0xAE;
    const CMD_DISPLAY_ON: u8 = 0xAF;
    const CMD_SET_CLOCK_DIV: u8 = 0xD5;
    const CMD_SET_MUX_RATIO: u8 = 0xA8;
    const CMD_SET_DISPLAY_OFFSET: u8 = 0xD3;
    const CMD_SET_START_LINE: u8 = 0x40;
    const CMD_CHARGE_PUMP: u8 = 0x8D;
    const CMD_MEMORY_MODE: u8 = 0x20;
    const CMD_SEG_REMAP: u8 = 0xA1;
    const CMD_COM_SCAN_DEC: u8 = 0xC8;
    const CMD_SET_COM_PINS: u8 = 0xDA;
    const CMD_SET_CONTRAST: u8 = 0x81;
    const CMD_SET_PRECHARGE: u8 = 0xD9;
    const CMD_SET_VCOM_DETECT: u8 = 0xDB;
    const CMD_RESUME_RAM: u8 = 0xA4;
    const CMD_NORMAL: u8 = 0xA6;
    const CMD_COLUMN_ADDR: u8 = 0x21;
    const CMD_PAGE_ADDR: u8 = 0x22;

    // Data bytes per i2c transfer, the controller doesn't care about the split
    const CHUNK: usize = 16;

    fn initialize(&mut self) -> anyhow::Result<()> {
        self.command(&[
            Self::CMD_DISPLAY_OFF,
            Self::CMD_SET_CLOCK_DIV,
            0x80,
            Self::CMD_SET_MUX_RATIO,
            (HEIGHT - 1) as u8,
            Self::CMD_SET_DISPLAY_OFFSET,
            0x00,
            Self::CMD_SET_START_LINE,
            Self::CMD_CHARGE_PUMP,
            0x14,
            // Horizontal addressing
            Self::CMD_MEMORY_MODE,
            0x00,
            Self::CMD_SEG_REMAP,
            Self::CMD_COM_SCAN_DEC,
            Self::CMD_SET_COM_PINS,
            0x12,
            Self::CMD_SET_CONTRAST,
            0xCF,
            Self::CMD_SET_PRECHARGE,
            0xF1,
            Self::CMD_SET_VCOM_DETECT,
            0x40,
            Self::CMD_RESUME_RAM,
            Self::CMD_NORMAL,
            Self::CMD_DISPLAY_ON,
        ])
    }

    fn command(&mut self, commands: &[u8]) -> anyhow::Result<()> {
        for &command in commands {
            self.i2c
                .write(&[Self::CONTROL_COMMAND, command])
                .context("Write command")?;
        }

        Ok(())
    }
}

impl Display for Ssd1306 {
    fn clear(&mut self) -> anyhow::Result<()> {
        self.buffer.clear();

        Ok(())
    }

    fn draw(&mut self, frame: &FrameBuffer) -> anyhow::Result<()> {
        self.buffer.clone_from(frame);

        Ok(())
    }

    fn present(&mut self) -> anyhow::Result<()> {
        self.command(&[
            Self::CMD_COLUMN_ADDR,
            0,
            (WIDTH - 1) as u8,
            Self::CMD_PAGE_ADDR,
            0,
            (PAGES - 1) as u8,
        ])
        .context("Set draw window")?;

        let mut transfer = [0; Self::CHUNK + 1];
        transfer[0] = Self::CONTROL_DATA;

        for chunk in self.buffer.0.chunks(Self::CHUNK) {
            transfer[1..=chunk.len()].copy_from_slice(chunk);

            self.i2c
                .write(&transfer[..=chunk.len()])
                .context("Write frame")?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for Ssd1306 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ssd1306").finish_non_exhaustive()
    }
}
