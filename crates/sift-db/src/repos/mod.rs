//! Repository modules for all sift entities.
//!
//! Each module holds connection-level functions (usable inside an open
//! transaction) and adds the public methods to `SiftDb` via `impl SiftDb`
//! blocks.

pub mod account;
pub mod item;
pub mod list;
pub mod shadow;
