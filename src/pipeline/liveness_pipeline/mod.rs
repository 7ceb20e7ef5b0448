pub mod liveness_pipeline;
