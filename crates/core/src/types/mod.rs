//! Domain types for Vitrine.

pub mod cart;
pub mod email;
pub mod id;
pub mod money;
pub mod page;
pub mod status;

pub use cart::{CartError, CartItem, CartStorage, CartStore, MemoryCartStorage, NewCartItem};
pub use email::{Email, EmailAddressError};
pub use id::*;
pub use money::{MoneyError, from_minor_units, to_minor_units};
pub use page::{Page, PageRequest};
pub use status::*;
