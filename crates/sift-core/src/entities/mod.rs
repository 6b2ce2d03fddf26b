//! Entity structs for all sift domain objects.
//!
//! Each persisted entity maps to a table in the libSQL database. All structs
//! derive `Serialize`, `Deserialize`, and `JsonSchema` for JSON roundtrip and
//! schema validation.

mod account;
mod item;
mod list;
mod shadow;

pub use account::{Account, AccountDisplay};
pub use item::{Item, ItemDetail, ItemParams, ItemRef};
pub use list::List;
pub use shadow::{EntityState, ShadowEntity};
