use tokio::time;

/// Configuration for the [`NotificationCoordinator`](crate::notify::NotificationCoordinator).
#[derive(Clone, Debug)]
pub struct NotificationConfig {
    toggle_interval: time::Duration,
    publish_timeout: time::Duration,
    stop_timeout: time::Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            toggle_interval: time::Duration::from_millis(600),
            publish_timeout: time::Duration::from_secs(2),
            stop_timeout: time::Duration::from_secs(3),
        }
    }
}

impl NotificationConfig {
    /// Returns the blinker half-period of an active alert.
    pub fn toggle_interval(&self) -> time::Duration {
        self.toggle_interval
    }

    /// Returns the timeout applied to each sink publish.
    pub fn publish_timeout(&self) -> time::Duration {
        self.publish_timeout
    }

    /// Returns how long a stop waits for the session to clear its alert before aborting it.
    pub fn stop_timeout(&self) -> time::Duration {
        self.stop_timeout
    }

    /// Sets the blinker half-period of an active alert.
    ///
    /// Default: `600` milliseconds
    pub fn with_toggle_interval(mut self, millis: u64) -> Self {
        self.toggle_interval = time::Duration::from_millis(millis.max(1));
        self
    }

    /// Sets the timeout applied to each sink publish.
    ///
    /// Default: `2_000` milliseconds
    pub fn with_publish_timeout(mut self, millis: u64) -> Self {
        self.publish_timeout = time::Duration::from_millis(millis);
        self
    }

    /// Sets how long a stop waits for the session to clear its alert.
    ///
    /// Default: `3_000` milliseconds
    pub fn with_stop_timeout(mut self, millis: u64) -> Self {
        self.stop_timeout = time::Duration::from_millis(millis);
        self
    }
}
