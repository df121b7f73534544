use std::time::Duration;

use anyhow::{bail, Context};
use rppal::uart::{Parity, Queue, Uart};
use tracing::instrument;

use crate::{config::SerialDefinition, systems::link::SerialPort};

/// Serial link to the microcontroller
pub struct UartLink {
    uart: Uart,
}

impl UartLink {
    #[instrument(level = "debug")]
    pub fn open(definition: &SerialDefinition) -> anyhow::Result<Self> {
        let mut uart = Uart::with_path(
            &definition.path,
            definition.baud_rate,
            Parity::None,
            8,
            definition.stop_bits,
        )
        .with_context(|| format!("Open serial port {}", definition.path.display()))?;

        // Reads return whatever is buffered without waiting
        uart.set_read_mode(0, Duration::ZERO)
            .context("Set uart read mode")?;
        uart.set_write_mode(true).context("Set uart write mode")?;
        uart.flush(Queue::Both).context("Flush uart")?;

        Ok(Self { uart })
    }
}

impl SerialPort for UartLink {
    fn bytes_available(&mut self) -> anyhow::Result<usize> {
        self.uart.input_len().context("Query uart input")
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> anyhow::Result<usize> {
        self.uart.read(buffer).context("Read uart")
    }

    fn write_bytes(&mut self, mut bytes: &[u8]) -> anyhow::Result<()> {
        while !bytes.is_empty() {
            let written = self.uart.write(bytes).context("Write uart")?;
            if written == 0 {
                bail!("Serial port stopped accepting data");
            }

            bytes = &bytes[written..];
        }

        Ok(())
    }
}

impl std::fmt::Debug for UartLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UartLink").finish_non_exhaustive()
    }
}
