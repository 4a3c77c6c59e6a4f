//! Core POP3 types.

mod listing;
mod response;

pub use listing::{MaildropStat, UidlEntry};
pub use response::{Response, Status};
