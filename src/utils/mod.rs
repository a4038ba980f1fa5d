//! Shared utilities: address helpers, external command lines, operator prompts.

pub mod command;
pub mod ip_utils;
pub mod prompt;

pub use command::{CommandError, CommandLine};
pub use ip_utils::{is_valid_ip, split_cidr};
pub use prompt::{AssumeYes, Confirm, StdinConfirm};
