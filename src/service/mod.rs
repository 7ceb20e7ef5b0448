pub mod detection_service;
pub mod stats_service;
