//! Scenario orchestration: one scenario through every stage, or many side
//! by side.

pub mod compare;
pub mod evaluate;
