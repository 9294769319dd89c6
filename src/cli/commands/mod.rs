//! One module per subcommand, each exposing `execute`.

pub mod completions;
pub mod history;
pub mod init;
pub mod key;
pub mod send;
pub mod template;
pub mod vault;
pub mod version;
