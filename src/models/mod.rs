pub mod detection_log_model;
pub mod detection_model;
pub mod stats_model;
