//! Remote execution and file transfer over resident SSH sessions.

pub mod command;
pub mod sanitize;
pub mod sftp;

pub use command::{exec_command, shape_command, ExecOutput};
pub use sanitize::{shell_quote, strip_ansi};
pub use sftp::FileEntry;
