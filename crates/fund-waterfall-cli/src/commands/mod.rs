pub mod carry;
pub mod returns;
pub mod waterfall;
