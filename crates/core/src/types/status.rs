//! Status enums for orders, users and one-time codes.
//!
//! Order statuses keep the Portuguese spellings used by the storefront's
//! clients; the same strings are the Postgres enum labels.

use serde::{Deserialize, Serialize};

/// Payment state of an order.
///
/// Moves `Pendente -> Pago` once, when the gateway reports a successful charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "storefront.payment_status"))]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "Pendente")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Pendente"))]
    Pending,
    #[serde(rename = "Pago")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Pago"))]
    Paid,
}

impl PaymentStatus {
    /// The wire and database spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pendente",
            Self::Paid => "Pago",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery state of an order, set by an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "storefront.delivery_status"))]
pub enum DeliveryStatus {
    #[default]
    #[serde(rename = "Pendente")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Pendente"))]
    Pending,
    #[serde(rename = "Enviado")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Enviado"))]
    Shipped,
    #[serde(rename = "Entregue")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Entregue"))]
    Delivered,
}

impl DeliveryStatus {
    /// The wire and database spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pendente",
            Self::Shipped => "Enviado",
            Self::Delivered => "Entregue",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pendente" => Ok(Self::Pending),
            "Enviado" => Ok(Self::Shipped),
            "Entregue" => Ok(Self::Delivered),
            _ => Err(format!("invalid delivery status: {s}")),
        }
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.user_role", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Regular customer.
    #[default]
    User,
    /// Store administrator.
    Admin,
}

impl Role {
    /// Whether this role grants access to the admin API.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "USER"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}

/// What a one-time code was issued for.
///
/// A user holds at most one outstanding code per purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.otp_purpose", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    EmailVerification,
    PasswordReset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Paid).unwrap_or_default(),
            "\"Pago\""
        );
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::Pending.to_string(), "Pendente");
    }

    #[test]
    fn test_delivery_status_parse() {
        assert_eq!("Entregue".parse(), Ok(DeliveryStatus::Delivered));
        assert_eq!("Enviado".parse(), Ok(DeliveryStatus::Shipped));
        assert!("Delivered".parse::<DeliveryStatus>().is_err());
    }

    #[test]
    fn test_delivery_status_deserialize() {
        let status: Result<DeliveryStatus, _> = serde_json::from_str("\"Entregue\"");
        assert!(matches!(status, Ok(DeliveryStatus::Delivered)));
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(
            serde_json::to_string(&Role::Admin).unwrap_or_default(),
            "\"ADMIN\""
        );
        assert!(Role::Admin.is_admin());
        assert!(!Role::User.is_admin());
    }
}
