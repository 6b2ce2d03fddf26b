//! ID prefix constants.
//!
//! Every generated id is `{prefix}-{8 hex chars}`, e.g. `itm-a3f8b2c1`.

pub const PREFIX_ACCOUNT: &str = "acc";
pub const PREFIX_LIST: &str = "lst";
pub const PREFIX_ITEM: &str = "itm";

pub const ALL_PREFIXES: &[&str] = &[PREFIX_ACCOUNT, PREFIX_LIST, PREFIX_ITEM];
