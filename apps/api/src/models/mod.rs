pub mod activity;
pub mod candidate;
