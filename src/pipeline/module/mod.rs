pub mod face_liveness;
pub mod label_decision;
