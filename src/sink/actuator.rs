use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use super::error::SinkResult;

/// Signal-output sink driven by the signal controller.
///
/// `set_outputs` must be idempotent: the controller may repeat the same levels, and it treats
/// every call as best-effort.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Sets the green lamps of both axes. Red lamps are the complement, yellow stays off.
    async fn set_outputs(&self, ns_green: bool, ew_green: bool) -> SinkResult<()>;

    /// Releases the outputs once the controller has stopped.
    async fn shutdown(&self) -> SinkResult<()> {
        Ok(())
    }
}

/// Console actuator that only logs the requested outputs.
#[derive(Debug, Default)]
pub struct SimulatedActuator;

#[async_trait]
impl Actuator for SimulatedActuator {
    async fn set_outputs(&self, ns_green: bool, ew_green: bool) -> SinkResult<()> {
        info!(ns_green, ew_green, "signal outputs");
        Ok(())
    }

    async fn shutdown(&self) -> SinkResult<()> {
        info!("signal outputs released");
        Ok(())
    }
}

/// BCM pin numbers of the six lamps of a two-axis signal head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioPins {
    pub ns_red: u16,
    pub ns_yellow: u16,
    pub ns_green: u16,
    pub ew_red: u16,
    pub ew_yellow: u16,
    pub ew_green: u16,
}

impl Default for GpioPins {
    fn default() -> Self {
        Self {
            ns_red: 17,
            ns_yellow: 27,
            ns_green: 22,
            ew_red: 23,
            ew_yellow: 24,
            ew_green: 25,
        }
    }
}

impl GpioPins {
    fn all(&self) -> [u16; 6] {
        [
            self.ns_red,
            self.ns_yellow,
            self.ns_green,
            self.ew_red,
            self.ew_yellow,
            self.ew_green,
        ]
    }
}

/// Actuator driving real lamps through the Linux sysfs GPIO interface.
#[derive(Debug, Clone)]
pub struct GpioActuator {
    root: PathBuf,
    pins: GpioPins,
}

impl GpioActuator {
    pub const SYSFS_ROOT: &'static str = "/sys/class/gpio";

    pub fn new(root: impl Into<PathBuf>, pins: GpioPins) -> Self {
        Self {
            root: root.into(),
            pins,
        }
    }

    /// Exports every pin (when not exported yet), configures it as an output and drives it low.
    pub async fn init(&self) -> SinkResult<()> {
        for pin in self.pins.all() {
            let pin_dir = self.pin_dir(pin);
            if fs::metadata(&pin_dir).await.is_err() {
                fs::write(self.root.join("export"), pin.to_string()).await?;
            }
            fs::write(pin_dir.join("direction"), "out").await?;
            self.write_pin(pin, false).await?;
        }

        info!(root = %self.root.display(), "GPIO actuator initialized");
        Ok(())
    }

    fn pin_dir(&self, pin: u16) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_pin(&self, pin: u16, high: bool) -> SinkResult<()> {
        let level = if high { "1" } else { "0" };
        fs::write(self.pin_dir(pin).join("value"), level).await?;
        Ok(())
    }
}

#[async_trait]
impl Actuator for GpioActuator {
    async fn set_outputs(&self, ns_green: bool, ew_green: bool) -> SinkResult<()> {
        let p = &self.pins;
        let heads = [
            (p.ns_red, p.ns_green, ns_green),
            (p.ew_red, p.ew_green, ew_green),
        ];

        // Heads turning red switch first, so both axes are never green at once
        for (red, green, _) in heads.iter().filter(|(_, _, on)| !on) {
            self.write_pin(*green, false).await?;
            self.write_pin(*red, true).await?;
        }

        self.write_pin(p.ns_yellow, false).await?;
        self.write_pin(p.ew_yellow, false).await?;

        for (red, green, _) in heads.iter().filter(|(_, _, on)| *on) {
            self.write_pin(*red, false).await?;
            self.write_pin(*green, true).await?;
        }

        debug!(ns_green, ew_green, "GPIO outputs written");
        Ok(())
    }

    /// Drives every lamp low and unexports its pin.
    async fn shutdown(&self) -> SinkResult<()> {
        for pin in self.pins.all() {
            self.write_pin(pin, false).await?;
            fs::write(self.root.join("unexport"), pin.to_string()).await?;
        }

        info!(root = %self.root.display(), "GPIO pins released");
        Ok(())
    }
}
