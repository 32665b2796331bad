// Serial link adapter - USB serial connection to the motor controller
use crate::application::link_channel::{LinkChannel, LinkConnector, LinkError};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type OpenResult = serialport::Result<Box<dyn SerialPort>>;
type PortOpener = dyn Fn(&str, u32, Duration) -> OpenResult + Send + Sync;

/// An open still running on its helper thread.
struct PendingOpen {
    path: String,
    result: mpsc::Receiver<OpenResult>,
}

/// Opens the vehicle's serial port.
///
/// `serialport` has no open timeout, so each open runs on a helper thread and the
/// caller waits at most `open_timeout`. A timed-out open is kept and awaited again by
/// the next call instead of starting another thread, so a hung driver costs one
/// thread, not one per frame.
pub struct SerialConnector {
    port: Option<String>,
    open_timeout: Duration,
    write_timeout: Duration,
    opener: Arc<PortOpener>,
    pending: Mutex<Option<PendingOpen>>,
}

impl SerialConnector {
    pub fn new(port: Option<String>, open_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            port,
            open_timeout,
            write_timeout,
            opener: Arc::new(open_serial),
            pending: Mutex::new(None),
        }
    }

    #[cfg(test)]
    fn with_opener(
        mut self,
        opener: impl Fn(&str, u32, Duration) -> OpenResult + Send + Sync + 'static,
    ) -> Self {
        self.opener = Arc::new(opener);
        self
    }

    fn resolve_port(&self) -> Result<String, LinkError> {
        if let Some(port) = &self.port {
            return Ok(port.clone());
        }
        let ports = serialport::available_ports().map_err(|e| LinkError::Open {
            port: "<enumeration>".to_string(),
            reason: e.to_string(),
        })?;
        first_usb_port(&ports).ok_or(LinkError::NoPortFound)
    }

    fn start_open(&self, path: String, baud_rate: u32) -> Result<PendingOpen, LinkError> {
        let (tx, rx) = mpsc::channel();
        let opener = self.opener.clone();
        let thread_path = path.clone();
        let write_timeout = self.write_timeout;
        std::thread::Builder::new()
            .name("serial-open".to_string())
            .spawn(move || {
                // The receiver is gone only if the connector was dropped; the port closes here
                let _ = tx.send(opener(&thread_path, baud_rate, write_timeout));
            })
            .map_err(|e| LinkError::Open {
                port: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(PendingOpen { path, result: rx })
    }
}

impl LinkConnector for SerialConnector {
    fn open(&self, baud_rate: u32) -> Result<Box<dyn LinkChannel>, LinkError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        let attempt = match pending.take() {
            Some(attempt) => {
                tracing::debug!("Waiting on earlier open of {}", attempt.path);
                attempt
            }
            None => self.start_open(self.resolve_port()?, baud_rate)?,
        };

        match attempt.result.recv_timeout(self.open_timeout) {
            Ok(Ok(port)) => {
                tracing::info!("Opened serial port {} at {} baud", attempt.path, baud_rate);
                Ok(Box::new(SerialLink::new(attempt.path, port)))
            }
            Ok(Err(e)) => Err(LinkError::Open {
                port: attempt.path,
                reason: e.to_string(),
            }),
            Err(RecvTimeoutError::Timeout) => {
                let err = LinkError::OpenTimeout {
                    port: attempt.path.clone(),
                    timeout_ms: self.open_timeout.as_millis() as u64,
                };
                *pending = Some(attempt);
                Err(err)
            }
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Open {
                port: attempt.path,
                reason: "open thread exited without a result".to_string(),
            }),
        }
    }
}

fn open_serial(path: &str, baud_rate: u32, write_timeout: Duration) -> OpenResult {
    serialport::new(path, baud_rate).timeout(write_timeout).open()
}

/// First port that enumerates as a USB device.
fn first_usb_port(ports: &[SerialPortInfo]) -> Option<String> {
    ports
        .iter()
        .find(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
        .map(|p| p.port_name.clone())
}

pub struct SerialLink {
    path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialLink {
    fn new(path: String, port: Box<dyn SerialPort>) -> Self {
        Self {
            path,
            port: Some(port),
        }
    }
}

impl LinkChannel for SerialLink {
    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn is_busy(&self) -> bool {
        self.port
            .as_ref()
            .and_then(|port| port.bytes_to_write().ok())
            .is_some_and(|pending| pending > 0)
    }

    fn send(&mut self, line: &str) -> Result<(), LinkError> {
        let Some(port) = self.port.as_mut() else {
            return Err(LinkError::Closed);
        };
        if let Err(e) = port.write_all(line.as_bytes()) {
            tracing::warn!("Write to {} failed: {}", self.path, e);
            self.port = None;
            return Err(LinkError::Write(e));
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!("Closed serial port {}", self.path);
        }
    }
}
