pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod history;
pub mod logging;
pub mod mail;
pub mod template;
pub mod vault;
