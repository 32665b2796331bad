// In-memory fakes for the link and classifier ports
use crate::application::classifier_port::{ClassifierError, ClassifierPort, ModelHandle};
use crate::application::link_channel::{LinkChannel, LinkConnector, LinkError};
use crate::domain::frame::Frame;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared view of everything the fake links did.
#[derive(Default)]
pub struct LinkRecorder {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
    /// Chronological log of "open", "send:<line>" and "close".
    pub events: Mutex<Vec<String>>,
    pub refuse_open: AtomicBool,
    pub busy: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Milliseconds each open blocks the calling thread, like a slow USB enumeration.
    pub open_delay_ms: AtomicU64,
}

impl LinkRecorder {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub recorder: Arc<LinkRecorder>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkConnector for FakeConnector {
    fn open(&self, _baud_rate: u32) -> Result<Box<dyn LinkChannel>, LinkError> {
        let delay = self.recorder.open_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(std::time::Duration::from_millis(delay));
        }
        self.recorder.events.lock().unwrap().push("open".to_string());
        self.recorder.opens.fetch_add(1, Ordering::SeqCst);
        if self.recorder.refuse_open.load(Ordering::SeqCst) {
            return Err(LinkError::NoPortFound);
        }
        Ok(Box::new(FakeLink {
            recorder: self.recorder.clone(),
            open: true,
        }))
    }
}

struct FakeLink {
    recorder: Arc<LinkRecorder>,
    open: bool,
}

impl LinkChannel for FakeLink {
    fn is_open(&self) -> bool {
        self.open
    }

    fn is_busy(&self) -> bool {
        self.recorder.busy.load(Ordering::SeqCst)
    }

    fn send(&mut self, line: &str) -> Result<(), LinkError> {
        if self.recorder.fail_writes.load(Ordering::SeqCst) {
            self.open = false;
            return Err(LinkError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "unplugged",
            )));
        }
        self.recorder.sent.lock().unwrap().push(line.to_string());
        self.recorder
            .events
            .lock()
            .unwrap()
            .push(format!("send:{}", line));
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        self.recorder.events.lock().unwrap().push("close".to_string());
    }
}

/// Returns a fixed label for every frame.
pub struct FakeClassifier {
    pub label: Mutex<String>,
    pub predictions: AtomicUsize,
    pub fail_load: bool,
}

impl FakeClassifier {
    pub fn new(label: &str) -> Self {
        Self {
            label: Mutex::new(label.to_string()),
            predictions: AtomicUsize::new(0),
            fail_load: false,
        }
    }

    pub fn set_label(&self, label: &str) {
        *self.label.lock().unwrap() = label.to_string();
    }

    pub fn predictions(&self) -> usize {
        self.predictions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassifierPort for FakeClassifier {
    async fn load_model(&self, model_path: &Path) -> Result<ModelHandle, ClassifierError> {
        if self.fail_load {
            return Err(ClassifierError::Decode("missing model".to_string()));
        }
        Ok(ModelHandle::new(model_path.display().to_string()))
    }

    async fn predict(&self, _frame: &Frame, _model: &ModelHandle, _labels_path: &Path) -> String {
        self.predictions.fetch_add(1, Ordering::SeqCst);
        self.label.lock().unwrap().clone()
    }
}

pub fn blank_frame() -> Frame {
    Frame::new(2, 2, Bytes::from(vec![0u8; 16])).unwrap()
}
