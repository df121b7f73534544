use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use chrono::NaiveDateTime;
use common::types::gps::Position;
use tracing::{debug, info};

use crate::tracking::LogAction;

pub const PAUSED_MARKER: &str = "PAUSED\n";

/// Append only log of one ride's path, one file per ride
#[derive(Debug)]
pub struct TrackLogger {
    dir: PathBuf,
    current: Option<(PathBuf, File)>,
}

impl TrackLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: None,
        }
    }

    pub fn file_name(start: NaiveDateTime) -> String {
        start.format("%Y-%m-%d_%H:%M:%S_track_path").to_string()
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|(path, _)| path.as_path())
    }

    /// Opens the file for a ride starting at `start`, local time.
    ///
    /// An existing file of the same name is appended to.
    pub fn start_new_file(&mut self, start: NaiveDateTime) -> anyhow::Result<&Path> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Create tracking dir {}", self.dir.display()))?;

        let path = self.dir.join(Self::file_name(start));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Open track file {}", path.display()))?;

        info!("Creating new track file {}", path.display());

        let (path, _) = self.current.insert((path, file));
        Ok(path.as_path())
    }

    pub fn append_sample(&mut self, position: Position) -> anyhow::Result<()> {
        self.append(&format!("{},{}\n", position.latitude, position.longitude))
    }

    pub fn append_paused(&mut self) -> anyhow::Result<()> {
        self.append(PAUSED_MARKER)
    }

    pub fn finish(&mut self) {
        if let Some((path, _)) = self.current.take() {
            info!("Closed track file {}", path.display());
        }
    }

    pub fn apply(&mut self, action: &LogAction) -> anyhow::Result<()> {
        match action {
            LogAction::Start(start) => self.start_new_file(*start).map(|_| ()),
            LogAction::Sample(position) => self.append_sample(*position),
            LogAction::Paused => self.append_paused(),
            LogAction::Finish => {
                self.finish();
                Ok(())
            }
        }
    }

    fn append(&mut self, line: &str) -> anyhow::Result<()> {
        let Some((path, file)) = &mut self.current else {
            bail!("No track file open");
        };

        debug!("Writing {} to {}", line.trim_end(), path.display());

        file.write_all(line.as_bytes())
            .with_context(|| format!("Append to {}", path.display()))?;

        Ok(())
    }
}
