pub mod liveness_pipeline;
pub mod model_config;
pub mod module;
pub mod utils;
