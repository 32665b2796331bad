// Frame domain model - camera frames and their display overlays
use bytes::Bytes;
use serde::Serialize;

const BYTES_PER_PIXEL: usize = 4;

const OVERLAY_COLOR: [u8; 3] = [255, 121, 0];
const OVERLAY_SCALE: f32 = 2.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FrameError {
    #[error("frame of {width}x{height} needs {expected} bytes of RGBA, got {actual}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("frame of {width}x{height} is too large")]
    TooLarge { width: u32, height: u32 },
}

/// One RGBA camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Bytes,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Bytes) -> Result<Self, FrameError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
            .ok_or(FrameError::TooLarge { width, height })?;
        if pixels.len() != expected {
            return Err(FrameError::SizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }
}

/// Text drawn over a frame by the display layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextOverlay {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub scale: f32,
    pub color: [u8; 3],
    pub thickness: u32,
}

impl TextOverlay {
    pub fn connection_status(connected: bool) -> Self {
        let text = if connected { "connected" } else { "disconnected" };
        Self {
            text: text.to_string(),
            x: 200,
            y: 200,
            scale: OVERLAY_SCALE,
            color: OVERLAY_COLOR,
            thickness: 2,
        }
    }

    pub fn label(label: &str) -> Self {
        Self {
            text: label.to_string(),
            x: 200,
            y: 100,
            scale: OVERLAY_SCALE,
            color: OVERLAY_COLOR,
            thickness: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub overlays: Vec<TextOverlay>,
}
