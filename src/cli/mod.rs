pub mod archive;
pub mod capture;
pub mod context;
pub mod search;
pub mod watch;
