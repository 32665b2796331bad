// Actuation channel manager - owns the vehicle link and decides what reaches the wire
use crate::application::link_channel::{LinkChannel, LinkConnector};
use crate::domain::control::{ControlSignal, IndicatorCommand};
use crate::domain::wire::WireCommand;
use std::sync::Arc;

enum LinkState {
    Disconnected,
    Connected(Box<dyn LinkChannel>),
}

/// Best-effort actuation: every failure is absorbed and only shows up through
/// [`is_connected`](Self::is_connected).
///
/// Each call to [`send_control`](Self::send_control) or
/// [`send_indicator`](Self::send_indicator) results in zero or one transmitted line:
/// 1. reconnect if there is no open link (skip the call if that fails)
/// 2. skip if the link is still draining a previous line
/// 3. skip if the command equals the last one transmitted
/// 4. otherwise transmit and remember the command
pub struct ActuationChannelManager {
    connector: Arc<dyn LinkConnector>,
    baud_rate: u32,
    speed_multiplier: i32,
    state: LinkState,
    last_sent: Option<WireCommand>,
    failed_opens: u32,
}

impl ActuationChannelManager {
    pub fn new(connector: Arc<dyn LinkConnector>, baud_rate: u32, speed_multiplier: i32) -> Self {
        Self {
            connector,
            baud_rate,
            speed_multiplier,
            state: LinkState::Disconnected,
            last_sent: None,
            failed_opens: 0,
        }
    }

    pub fn send_control(&mut self, signal: &ControlSignal) {
        let command = WireCommand::drive(signal, self.speed_multiplier);
        self.transmit(command);
    }

    pub fn send_indicator(&mut self, indicator: &IndicatorCommand) {
        self.transmit(WireCommand::indicator(indicator));
    }

    pub fn is_connected(&self) -> bool {
        match &self.state {
            LinkState::Connected(link) => link.is_open(),
            LinkState::Disconnected => false,
        }
    }

    /// Run `op` on the blocking pool so link I/O never stalls the async runtime.
    ///
    /// The manager moves to the blocking thread and comes back with the result.
    pub async fn off_runtime<T, F>(mut self, op: F) -> (Self, T)
    where
        T: Send + 'static,
        F: FnOnce(&mut Self) -> T + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(move || {
            let out = op(&mut self);
            (self, out)
        });
        match task.await {
            Ok(done) => done,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }

    /// Last command that was actually written to the link.
    pub fn last_sent(&self) -> Option<WireCommand> {
        self.last_sent
    }

    /// Open a link unless an open one already exists. Returns whether a usable link exists.
    pub fn ensure_connected(&mut self) -> bool {
        if self.is_connected() {
            return true;
        }
        // A link that reports closed is released before reopening
        self.release();

        match self.connector.open(self.baud_rate) {
            Ok(link) => {
                tracing::info!(
                    "Vehicle link opened at {} baud after {} failed attempts",
                    self.baud_rate,
                    self.failed_opens
                );
                self.failed_opens = 0;
                self.state = LinkState::Connected(link);
                self.is_connected()
            }
            Err(e) => {
                self.failed_opens += 1;
                if self.failed_opens == 1 {
                    tracing::warn!("Vehicle link unavailable: {}", e);
                } else {
                    tracing::debug!("Vehicle link still unavailable ({}): {}", self.failed_opens, e);
                }
                false
            }
        }
    }

    /// Stop the vehicle and release the link.
    ///
    /// The stop line is written unconditionally so a session never ends mid-motion,
    /// even if the previous command was already a stop.
    pub fn disconnect(&mut self) {
        let LinkState::Connected(mut link) =
            std::mem::replace(&mut self.state, LinkState::Disconnected)
        else {
            return;
        };

        if link.is_open() {
            let stop = WireCommand::stop();
            match link.send(&stop.to_string()) {
                Ok(()) => self.last_sent = Some(stop),
                Err(e) => tracing::warn!("Failed to send stop before disconnect: {}", e),
            }
        }
        link.close();
        tracing::info!("Vehicle link closed");
    }

    fn transmit(&mut self, command: WireCommand) {
        if !self.ensure_connected() {
            return;
        }
        let LinkState::Connected(link) = &mut self.state else {
            return;
        };

        if link.is_busy() {
            tracing::trace!("Link busy, skipping {:?}", command);
            return;
        }
        if self.last_sent == Some(command) {
            return;
        }

        match link.send(&command.to_string()) {
            Ok(()) => {
                tracing::debug!("Sent {:?}", command);
                self.last_sent = Some(command);
            }
            Err(e) => {
                tracing::warn!("Vehicle link write failed, dropping link: {}", e);
                self.release();
            }
        }
    }

    fn release(&mut self) {
        if let LinkState::Connected(mut link) =
            std::mem::replace(&mut self.state, LinkState::Disconnected)
        {
            link.close();
        }
    }
}

impl Drop for ActuationChannelManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::FakeConnector;
    use std::sync::atomic::Ordering;

    fn manager(connector: &FakeConnector) -> ActuationChannelManager {
        ActuationChannelManager::new(Arc::new(connector.clone()), 115_200, 131)
    }

    #[test]
    fn test_first_send_opens_before_writing() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);

        actuation.send_control(&ControlSignal::new(1.0, 1.0));

        assert_eq!(connector.recorder.opens(), 1);
        assert_eq!(connector.recorder.events(), vec!["open", "send:c131,131\r\n"]);
        assert!(actuation.is_connected());
    }

    #[test]
    fn test_message_formatting() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);

        actuation.send_control(&ControlSignal::new(1.0, -1.0));

        assert_eq!(connector.recorder.sent(), vec!["c131,-131\r\n"]);
        assert_eq!(
            actuation.last_sent(),
            Some(WireCommand::Drive { left: 131, right: -131 })
        );
    }

    #[test]
    fn test_identical_commands_are_sent_once() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);

        actuation.send_control(&ControlSignal::STOP);
        actuation.send_control(&ControlSignal::STOP);

        assert_eq!(connector.recorder.sent(), vec!["c0,0\r\n"]);
        assert_eq!(connector.recorder.opens(), 1);
    }

    #[test]
    fn test_changed_command_is_sent() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);

        actuation.send_control(&ControlSignal::new(1.0, 1.0));
        actuation.send_control(&ControlSignal::STOP);
        actuation.send_control(&ControlSignal::new(1.0, 1.0));

        assert_eq!(
            connector.recorder.sent(),
            vec!["c131,131\r\n", "c0,0\r\n", "c131,131\r\n"]
        );
    }

    #[test]
    fn test_busy_link_skips_without_touching_last_sent() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);
        actuation.send_control(&ControlSignal::STOP);

        connector.recorder.busy.store(true, Ordering::SeqCst);
        actuation.send_control(&ControlSignal::new(-1.0, 1.0));

        assert_eq!(connector.recorder.sent(), vec!["c0,0\r\n"]);
        assert_eq!(actuation.last_sent(), Some(WireCommand::stop()));

        // next frame goes through once the link drains
        connector.recorder.busy.store(false, Ordering::SeqCst);
        actuation.send_control(&ControlSignal::new(-1.0, 1.0));
        assert_eq!(connector.recorder.sent(), vec!["c0,0\r\n", "c-131,131\r\n"]);
    }

    #[test]
    fn test_open_failure_is_absorbed_and_retried() {
        let connector = FakeConnector::new();
        connector.recorder.refuse_open.store(true, Ordering::SeqCst);
        let mut actuation = manager(&connector);

        actuation.send_control(&ControlSignal::STOP);
        actuation.send_control(&ControlSignal::STOP);
        assert!(!actuation.is_connected());
        assert_eq!(connector.recorder.opens(), 2);
        assert!(connector.recorder.sent().is_empty());
        assert_eq!(actuation.last_sent(), None);

        connector.recorder.refuse_open.store(false, Ordering::SeqCst);
        actuation.send_control(&ControlSignal::STOP);
        assert!(actuation.is_connected());
        assert_eq!(connector.recorder.sent(), vec!["c0,0\r\n"]);
    }

    #[test]
    fn test_write_failure_drops_link_and_reconnects() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);
        actuation.send_control(&ControlSignal::STOP);

        connector.recorder.fail_writes.store(true, Ordering::SeqCst);
        actuation.send_control(&ControlSignal::new(1.0, 1.0));
        assert!(!actuation.is_connected());
        assert_eq!(actuation.last_sent(), Some(WireCommand::stop()));

        connector.recorder.fail_writes.store(false, Ordering::SeqCst);
        actuation.send_control(&ControlSignal::new(1.0, 1.0));
        assert_eq!(connector.recorder.opens(), 2);
        assert_eq!(connector.recorder.sent(), vec!["c0,0\r\n", "c131,131\r\n"]);
    }

    #[test]
    fn test_indicator_shares_dedup_with_drive() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);

        actuation.send_indicator(&IndicatorCommand::new(-1));
        actuation.send_indicator(&IndicatorCommand::new(-1));
        actuation.send_control(&ControlSignal::STOP);
        actuation.send_indicator(&IndicatorCommand::new(-1));

        assert_eq!(
            connector.recorder.sent(),
            vec!["i-1\r\n", "c0,0\r\n", "i-1\r\n"]
        );
    }

    #[test]
    fn test_disconnect_sends_stop_then_closes() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);
        actuation.send_control(&ControlSignal::new(1.0, 1.0));

        actuation.disconnect();

        assert_eq!(
            connector.recorder.events(),
            vec!["open", "send:c131,131\r\n", "send:c0,0\r\n", "close"]
        );
        assert!(!actuation.is_connected());
    }

    #[test]
    fn test_disconnect_sends_stop_even_after_stop() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);
        actuation.send_control(&ControlSignal::STOP);

        actuation.disconnect();

        assert_eq!(connector.recorder.sent(), vec!["c0,0\r\n", "c0,0\r\n"]);
    }

    #[test]
    fn test_disconnect_without_link_is_noop() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);

        actuation.disconnect();

        assert_eq!(connector.recorder.opens(), 0);
        assert!(connector.recorder.events().is_empty());
    }

    #[test]
    fn test_dedup_survives_reconnect() {
        let connector = FakeConnector::new();
        let mut actuation = manager(&connector);
        actuation.send_control(&ControlSignal::STOP);
        actuation.disconnect();

        actuation.send_control(&ControlSignal::STOP);

        assert_eq!(connector.recorder.opens(), 2);
        assert_eq!(connector.recorder.sent(), vec!["c0,0\r\n", "c0,0\r\n"]);
    }

    #[tokio::test]
    async fn test_off_runtime_returns_manager_and_result() {
        let connector = FakeConnector::new();
        let actuation = manager(&connector);

        let (actuation, connected) = actuation
            .off_runtime(|a| {
                a.send_control(&ControlSignal::new(1.0, 1.0));
                a.is_connected()
            })
            .await;

        assert!(connected);
        assert!(actuation.is_connected());
        assert_eq!(connector.recorder.sent(), vec!["c131,131\r\n"]);
    }

    #[test]
    fn test_drop_stops_vehicle() {
        let connector = FakeConnector::new();
        {
            let mut actuation = manager(&connector);
            actuation.send_control(&ControlSignal::new(1.0, -1.0));
        }
        assert_eq!(
            connector.recorder.sent(),
            vec!["c131,-131\r\n", "c0,0\r\n"]
        );
        assert_eq!(connector.recorder.closes(), 1);
    }
}
