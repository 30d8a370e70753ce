use log::{debug, info, warn};

/// Thin wrapper over the `log` facade that prefixes each line with its component.
pub struct LogManager {
    component: &'static str,
}

impl LogManager {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn trace_stage(&self, message: &str) {
        debug!("[{}] {}", self.component, message);
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.component, message);
    }

    pub fn alert(&self, message: &str) {
        warn!("[{}] {}", self.component, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("guard")
    }
}
