pub mod batch;
pub mod checker;
pub mod scheduler;
