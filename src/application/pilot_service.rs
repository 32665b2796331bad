// Pilot service - serialises frames and operator commands onto the single control loop task
use crate::application::actuation_service::ActuationChannelManager;
use crate::application::frame_loop::{FrameControlLoop, FrameOutcome};
use crate::domain::control::{Decision, IndicatorCommand};
use crate::domain::frame::Frame;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
#[error("control loop has stopped")]
pub struct LoopClosed;

enum LoopCommand {
    Frame {
        frame: Frame,
        reply: oneshot::Sender<FrameOutcome>,
    },
    Indicator(IndicatorCommand),
    Disconnect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoopStatus {
    pub connected: bool,
    pub model_loaded: bool,
    pub last_label: Option<String>,
    pub last_decision: Option<Decision>,
    /// Last line written to the vehicle, without the line terminator.
    pub last_command: Option<String>,
    pub frames_processed: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Cloneable front door to the control loop task.
///
/// Every link mutation happens on that one task, in submission order.
#[derive(Clone)]
pub struct PilotService {
    commands: mpsc::Sender<LoopCommand>,
    status: watch::Receiver<LoopStatus>,
    shutdown: Arc<Notify>,
}

impl PilotService {
    /// Spawn the loop task. It stops the vehicle and exits once every handle is dropped
    /// or [`shutdown`](Self::shutdown) is called.
    pub fn spawn(
        control_loop: FrameControlLoop,
        actuation: ActuationChannelManager,
        queue: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let initial = LoopStatus {
            model_loaded: control_loop.has_model(),
            ..LoopStatus::default()
        };
        let (status_tx, status_rx) = watch::channel(initial);

        let shutdown = Arc::new(Notify::new());

        let worker = tokio::spawn(run(rx, shutdown.clone(), control_loop, actuation, status_tx));

        (
            Self {
                commands: tx,
                status: status_rx,
                shutdown,
            },
            worker,
        )
    }

    pub async fn submit_frame(&self, frame: Frame) -> Result<FrameOutcome, LoopClosed> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(LoopCommand::Frame { frame, reply })
            .await
            .map_err(|_| LoopClosed)?;
        outcome.await.map_err(|_| LoopClosed)
    }

    pub async fn indicate(&self, indicator: IndicatorCommand) -> Result<(), LoopClosed> {
        self.commands
            .send(LoopCommand::Indicator(indicator))
            .await
            .map_err(|_| LoopClosed)
    }

    pub async fn disconnect(&self) -> Result<(), LoopClosed> {
        self.commands
            .send(LoopCommand::Disconnect)
            .await
            .map_err(|_| LoopClosed)
    }

    pub fn status(&self) -> LoopStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopStatus> {
        self.status.clone()
    }

    /// Stop the vehicle and end the loop even while handles are still alive.
    ///
    /// Status subscribers see their stream end, which lets open SSE responses finish.
    pub fn shutdown(&self) {
        // notify_one keeps a permit if the loop is busy with a frame
        self.shutdown.notify_one();
    }
}

async fn run(
    mut commands: mpsc::Receiver<LoopCommand>,
    shutdown: Arc<Notify>,
    control_loop: FrameControlLoop,
    mut actuation: ActuationChannelManager,
    status: watch::Sender<LoopStatus>,
) {
    tracing::info!("Control loop started");

    loop {
        let command = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
            _ = shutdown.notified() => {
                tracing::info!("Control loop shutdown requested");
                break;
            }
        };

        actuation = match command {
            LoopCommand::Frame { frame, reply } => {
                let (actuation, outcome) = control_loop.process_frame(frame, actuation).await;
                status.send_modify(|s| {
                    s.last_label = Some(outcome.label.clone());
                    s.last_decision = outcome.decision;
                    s.frames_processed += 1;
                });
                publish_link(&status, &actuation);
                // The caller may have gone away; the frame was still acted on
                let _ = reply.send(outcome);
                actuation
            }
            LoopCommand::Indicator(indicator) => {
                let (actuation, ()) = actuation
                    .off_runtime(move |a| a.send_indicator(&indicator))
                    .await;
                publish_link(&status, &actuation);
                actuation
            }
            LoopCommand::Disconnect => {
                let (actuation, ()) = actuation.off_runtime(|a| a.disconnect()).await;
                publish_link(&status, &actuation);
                actuation
            }
        };
    }

    // Refuse further commands before the final stop goes out
    commands.close();
    let (actuation, ()) = actuation.off_runtime(|a| a.disconnect()).await;
    publish_link(&status, &actuation);
    tracing::info!("Control loop stopped");
}

fn publish_link(status: &watch::Sender<LoopStatus>, actuation: &ActuationChannelManager) {
    let connected = actuation.is_connected();
    let last_command = actuation
        .last_sent()
        .map(|command| command.to_string().trim_end().to_string());
    status.send_modify(|s| {
        s.connected = connected;
        s.last_command = last_command;
        s.updated_at = Some(Utc::now());
    });
}
