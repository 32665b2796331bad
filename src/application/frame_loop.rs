// Frame control loop - one perception-to-actuation pass per camera frame
use crate::application::actuation_service::ActuationChannelManager;
use crate::application::classifier_port::{ClassifierPort, ModelHandle};
use crate::application::control_mapper::ControlMapper;
use crate::domain::control::Decision;
use crate::domain::frame::{AnnotatedFrame, Frame, TextOverlay};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub label: String,
    /// `None` when no model was available and the frame was not classified.
    pub decision: Option<Decision>,
    pub connected: bool,
    pub annotated: AnnotatedFrame,
}

pub struct FrameControlLoop {
    classifier: Arc<dyn ClassifierPort>,
    model: Option<ModelHandle>,
    labels_path: PathBuf,
    mapper: ControlMapper,
}

impl FrameControlLoop {
    pub fn new(
        classifier: Arc<dyn ClassifierPort>,
        model: Option<ModelHandle>,
        labels_path: PathBuf,
        mapper: ControlMapper,
    ) -> Self {
        Self {
            classifier,
            model,
            labels_path,
            mapper,
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Classify, decide, actuate, then annotate. Never fails.
    ///
    /// The manager is handed back once actuation has run on the blocking pool.
    pub async fn process_frame(
        &self,
        frame: Frame,
        actuation: ActuationChannelManager,
    ) -> (ActuationChannelManager, FrameOutcome) {
        let Some(model) = &self.model else {
            let connected = actuation.is_connected();
            return (actuation, annotate(frame, String::new(), None, connected));
        };

        let label = self
            .classifier
            .predict(&frame, model, &self.labels_path)
            .await;
        let decision = self.mapper.map(&label);
        tracing::debug!("Label {:?} -> {:?}", label, decision);

        let (actuation, connected) = match decision {
            Decision::Drive(signal) => {
                actuation
                    .off_runtime(move |a| {
                        a.send_control(&signal);
                        a.is_connected()
                    })
                    .await
            }
            Decision::Indicate(indicator) => {
                actuation
                    .off_runtime(move |a| {
                        a.send_indicator(&indicator);
                        a.is_connected()
                    })
                    .await
            }
            Decision::Hold => {
                let connected = actuation.is_connected();
                (actuation, connected)
            }
        };

        (actuation, annotate(frame, label, Some(decision), connected))
    }
}

fn annotate(frame: Frame, label: String, decision: Option<Decision>, connected: bool) -> FrameOutcome {
    let overlays = vec![
        TextOverlay::connection_status(connected),
        TextOverlay::label(&label),
    ];
    FrameOutcome {
        label,
        decision,
        connected,
        annotated: AnnotatedFrame { frame, overlays },
    }
}
