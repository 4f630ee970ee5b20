//! Domain models for the storefront.
//!
//! These are validated domain objects; database row types stay private to
//! the `db` module.

pub mod order;
pub mod otp;
pub mod product;
pub mod review;
pub mod session;
pub mod user;

pub use order::{Address, NewOrder, Order};
pub use otp::OtpRecord;
pub use product::{NewProduct, Product, ProductImage};
pub use review::Review;
pub use session::CurrentUser;
pub use user::User;
