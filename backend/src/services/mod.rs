pub mod rotation_service;
pub mod spin_recorder;
