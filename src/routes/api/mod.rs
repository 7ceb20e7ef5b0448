pub mod detect;
pub mod stats;
