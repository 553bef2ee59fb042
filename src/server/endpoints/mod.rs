pub mod schedule;
pub mod status;
pub mod users;
