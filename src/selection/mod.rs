pub mod filter;
pub mod planner;
