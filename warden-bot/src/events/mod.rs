pub mod spam;
pub mod unknown_command;
