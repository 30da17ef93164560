pub mod classifier;
pub mod face_batch;
