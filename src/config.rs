use std::num::NonZeroUsize;

/// Tuning knobs shared by both messenger flavours.
#[derive(Debug, Clone)]
pub struct MessengerConfig {
    /// Number of channels the registry is pre-sized for.
    pub initial_capacity: usize,

    /// Idle snapshot buffers kept per message/token pair.
    pub max_pooled_buffers: usize,

    /// Weak messenger only: sweep collected recipients after this many
    /// successful registrations. `None` leaves sweeping to `cleanup()`.
    pub auto_cleanup_interval: Option<NonZeroUsize>,
}

impl MessengerConfig {
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_max_pooled_buffers(mut self, max_pooled_buffers: usize) -> Self {
        self.max_pooled_buffers = max_pooled_buffers;
        self
    }

    pub fn with_auto_cleanup_interval(mut self, interval: usize) -> Self {
        self.auto_cleanup_interval = NonZeroUsize::new(interval);
        self
    }
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            max_pooled_buffers: 8,
            auto_cleanup_interval: None,
        }
    }
}
