pub mod api;
pub mod cli;
pub mod clock;
pub mod errors;
pub mod orders;
pub mod repository;
pub mod service;
pub mod state;
pub mod store;
pub mod time;
pub mod utils;
