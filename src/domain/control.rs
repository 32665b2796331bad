// Control domain model - drive and indicator commands
use serde::Serialize;

/// Differential-drive command, both wheels normalized to [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlSignal {
    left: f32,
    right: f32,
}

impl ControlSignal {
    pub const STOP: ControlSignal = ControlSignal {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f32, right: f32) -> Self {
        Self {
            left: Self::clamp(left),
            right: Self::clamp(right),
        }
    }

    pub fn left(&self) -> f32 {
        self.left
    }

    pub fn right(&self) -> f32 {
        self.right
    }

    fn clamp(value: f32) -> f32 {
        // NaN would compare false against both bounds
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(-1.0, 1.0)
    }
}

/// Turn signal state: -1 left, 0 off, 1 right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndicatorCommand {
    direction: i8,
}

impl IndicatorCommand {
    /// Any negative value means left, any positive value right.
    pub fn new(direction: i32) -> Self {
        Self {
            direction: direction.signum() as i8,
        }
    }

    pub fn direction(&self) -> i8 {
        self.direction
    }
}

/// Outcome of mapping a label: what, if anything, to actuate this frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    Drive(ControlSignal),
    Indicate(IndicatorCommand),
    /// Send nothing and leave the vehicle doing whatever it was doing.
    Hold,
}
