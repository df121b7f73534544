use std::{
    io::{BufRead, BufReader, ErrorKind, Write},
    net::TcpStream,
    process::Command,
    time::Duration,
};

use anyhow::{bail, Context};
use tracing::{info, instrument};

use crate::{
    config::GpsdLaunch,
    systems::gps::{GpsRead, GpsSource},
};

/// JSON client for a local gpsd
#[derive(Debug)]
pub struct Gpsd {
    reader: BufReader<TcpStream>,
    pending: Vec<u8>,
}

impl Gpsd {
    const WATCH: &'static [u8] = b"?WATCH={\"enable\":true,\"json\":true}\n";

    /// Connects and asks gpsd to stream reports.
    ///
    /// Reads give up after `read_timeout` so the caller can check for
    /// shutdown between reports.
    #[instrument(level = "debug")]
    pub fn connect(address: &str, read_timeout: Duration) -> anyhow::Result<Self> {
        let mut stream =
            TcpStream::connect(address).with_context(|| format!("Connect to gpsd at {address}"))?;

        stream
            .set_read_timeout(Some(read_timeout))
            .context("Set gpsd read timeout")?;
        stream.write_all(Self::WATCH).context("Enable gpsd watch")?;

        Ok(Self {
            reader: BufReader::new(stream),
            pending: Vec::new(),
        })
    }

    /// Starts the daemon on `launch.device`, it forks into the background
    pub fn launch(launch: &GpsdLaunch) -> anyhow::Result<()> {
        info!("Starting gpsd on {}", launch.device.display());

        let status = Command::new("gpsd")
            .arg(&launch.device)
            .arg("-F")
            .arg(&launch.control_socket)
            .status()
            .context("Spawn gpsd")?;

        if !status.success() {
            bail!("gpsd exited with {status}");
        }

        Ok(())
    }
}

impl GpsSource for Gpsd {
    fn read(&mut self) -> anyhow::Result<GpsRead> {
        let rst = self.reader.read_until(b'\n', &mut self.pending);

        match rst {
            Ok(0) => Ok(GpsRead::Closed),
            Ok(_) if self.pending.ends_with(b"\n") => {
                let line = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();

                Ok(GpsRead::Line(line))
            }
            // Stream ended mid line, the next read reports the close
            Ok(_) => Ok(GpsRead::Pending),
            // Partial data stays in `pending` until the rest arrives
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(GpsRead::Pending)
            }
            Err(err) => Err(err).context("Read from gpsd"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Write},
        net::TcpListener,
        thread,
    };

    use super::*;

    #[test]
    fn streams_lines_from_gpsd() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();

            let mut watch = String::new();
            BufReader::new(socket.try_clone().unwrap())
                .read_line(&mut watch)
                .unwrap();

            socket.write_all(b"{\"class\":\"VERSION\"}\n{\"class\":\"TP").unwrap();
            socket.flush().unwrap();
            thread::sleep(Duration::from_millis(150));
            socket.write_all(b"V\",\"mode\":1}\n").unwrap();

            watch
        });

        let mut gpsd = Gpsd::connect(&address, Duration::from_millis(50)).unwrap();

        let mut lines = Vec::new();
        loop {
            match gpsd.read().unwrap() {
                GpsRead::Line(line) => lines.push(line),
                GpsRead::Pending => {}
                GpsRead::Closed => break,
            }
        }

        let watch = server.join().unwrap();
        assert!(watch.starts_with("?WATCH="));
        assert_eq!(
            lines,
            vec![
                "{\"class\":\"VERSION\"}\n".to_owned(),
                "{\"class\":\"TPV\",\"mode\":1}\n".to_owned()
            ]
        );
    }
}
