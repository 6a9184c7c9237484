pub mod latest;
pub mod once;
pub mod setup;
pub mod ui;
