pub mod active;
pub mod annotations;
pub mod fusion;
pub mod session;
pub mod types;
