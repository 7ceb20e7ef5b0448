pub mod detection_handler;
pub mod stats_handler;
