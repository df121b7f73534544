use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use tracing::info;

/// Cooperative stop flag checked by every loop once per tick
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    /// Creates a flag that is raised by ctrl-c
    pub fn install() -> anyhow::Result<Self> {
        let this = Self::default();

        let flag = this.clone();
        ctrlc::set_handler(move || {
            info!("Got ctrl-c");
            flag.request();
        })
        .context("Set ctrl-c")?;

        Ok(this)
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
