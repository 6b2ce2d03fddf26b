pub mod account;
pub mod list;

pub use account::AccountCommands;
pub use list::ListCommands;
