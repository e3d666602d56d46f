pub mod commands;
pub mod driver;
pub mod error;
pub mod history;
pub mod reader;
pub mod session;
pub mod transcript;
pub mod utils;
