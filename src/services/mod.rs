pub mod ai;
pub mod calendar;
pub mod enrichment;
pub mod intake;
pub mod store;
pub mod views;
