//! Line-oriented host front end for a cartridge session.

pub mod command;
pub mod session;

pub use command::{Command, CommandError};
pub use session::Session;
