pub mod detection_state;
pub mod stats_state;
