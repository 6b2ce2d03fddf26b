pub mod account;
pub mod daemon;
pub mod dispatch;
pub mod items;
pub mod list;
pub mod resolve;
pub mod shared;
pub mod sync;
