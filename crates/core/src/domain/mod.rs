pub mod expense;
pub mod user;
pub mod workflow;
