// Link channel ports - serial connection to the vehicle's motor controller

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("no USB serial port found")]
    NoPortFound,

    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("opening {port} timed out after {timeout_ms}ms")]
    OpenTimeout { port: String, timeout_ms: u64 },

    #[error("link is closed")]
    Closed,

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// An open, half-duplex line link. Fire-and-forget: nothing is read back.
pub trait LinkChannel: Send {
    /// False once the link has been closed or a write has failed.
    fn is_open(&self) -> bool;

    /// True while a previous line is still draining.
    fn is_busy(&self) -> bool;

    fn send(&mut self, line: &str) -> Result<(), LinkError>;

    fn close(&mut self);
}

/// Opens new links; called whenever the manager finds no usable link.
pub trait LinkConnector: Send + Sync {
    fn open(&self, baud_rate: u32) -> Result<Box<dyn LinkChannel>, LinkError>;
}
