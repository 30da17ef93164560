pub mod error;
pub mod inference_logger;
pub mod job;
pub mod scheduler;
pub mod status;
pub mod verdict;
