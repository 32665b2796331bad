// Wire protocol to the motor controller - ASCII lines terminated by CR LF
use super::control::{ControlSignal, IndicatorCommand};
use std::fmt;

pub const DEFAULT_SPEED_MULTIPLIER: i32 = 131;

/// A command in the integer units the vehicle firmware expects.
///
/// Deduplication compares these values directly rather than their rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireCommand {
    Drive { left: i32, right: i32 },
    Indicator { direction: i8 },
}

impl WireCommand {
    pub fn drive(signal: &ControlSignal, speed_multiplier: i32) -> Self {
        let scale = |value: f32| (value * speed_multiplier as f32).round() as i32;
        WireCommand::Drive {
            left: scale(signal.left()),
            right: scale(signal.right()),
        }
    }

    pub fn indicator(command: &IndicatorCommand) -> Self {
        WireCommand::Indicator {
            direction: command.direction(),
        }
    }

    pub fn stop() -> Self {
        WireCommand::Drive { left: 0, right: 0 }
    }
}

impl fmt::Display for WireCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireCommand::Drive { left, right } => write!(f, "c{},{}\r\n", left, right),
            WireCommand::Indicator { direction } => write!(f, "i{}\r\n", direction),
        }
    }
}
