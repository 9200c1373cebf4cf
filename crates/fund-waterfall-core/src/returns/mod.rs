pub mod allocation;
pub mod performance;
