// Application layer - ports and use cases of the control loop
pub mod actuation_service;
pub mod classifier_port;
pub mod control_mapper;
pub mod frame_loop;
pub mod link_channel;
pub mod pilot_service;

#[cfg(test)]
pub mod testing;
