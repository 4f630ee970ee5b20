//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login and account changes
//! - `cart` - Session-backed cart and catalog reconciliation
//! - `checkout` - Payment intent negotiation and order upsert
//! - `email` - Transactional email (verification codes, password reset)
//! - `otp` - One-time codes for email verification and password reset
//! - `retry` - Bounded retry for gateway calls

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod email;
pub mod otp;
pub mod retry;

pub use auth::{AuthError, AuthService};
pub use checkout::{CheckoutError, CheckoutService, CheckoutSession, OrderStore, PaymentGateway};
pub use email::{EmailError, EmailService};
pub use otp::{Mailer, OtpError, OtpService, OtpStore};
pub use retry::RetryPolicy;
