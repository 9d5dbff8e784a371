//! Data models for backend payloads.
//!
//! - `Account`, `Role`, `Permission`, `Unit`: the signed-in identity returned
//!   by login, refresh and the account endpoint
//! - `LoginData`, `AccountData`, `AccessToken`: the auth endpoint payloads
//! - `Page`: the paginated list wrapper used by every listing endpoint

pub mod account;
pub mod page;

pub use account::{Account, AccessToken, AccountData, LoginData, Permission, Role, Unit, UnitType};
pub use page::{Page, PageMeta};
