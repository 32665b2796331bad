// Domain layer - value types shared by the control loop
pub mod control;
pub mod frame;
pub mod wire;
