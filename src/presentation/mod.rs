// Presentation layer - HTTP surface for the camera client and operators
pub mod app_state;
pub mod handlers;
pub mod router;
