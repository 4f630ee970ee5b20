//! Aggregates for the admin dashboard.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use vitrine_core::{PaymentStatus, from_minor_units};

use super::RepositoryError;

/// Store-wide counters.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Summary {
    /// Sum of paid order amounts, in minor units.
    pub total_sales: i64,
    pub products: i64,
    pub orders: i64,
    pub paid_orders: i64,
    pub unpaid_orders: i64,
    pub users: i64,
}

/// One bar of the sales chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesPoint {
    /// `DD/MM`.
    pub date: String,
    /// Paid total for the day in major units.
    pub sale: Decimal,
}

#[derive(sqlx::FromRow)]
struct DailySalesRow {
    day: NaiveDate,
    amount: i64,
}

/// Half-open UTC range `[start of today - 7 days, start of today)`.
///
/// Covers the seven full days before `today`.
#[must_use]
pub fn sales_window(today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = today.and_time(NaiveTime::MIN).and_utc();
    let start = today
        .checked_sub_days(Days::new(7))
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
        .and_utc();
    (start, end)
}

fn to_point(day: NaiveDate, amount: i64) -> SalesPoint {
    SalesPoint {
        date: day.format("%d/%m").to_string(),
        sale: from_minor_units(amount),
    }
}

/// Repository for dashboard aggregates.
#[derive(Clone, Copy)]
pub struct StatsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepository<'a> {
    /// Create a new stats repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Compute the dashboard counters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self) -> Result<Summary, RepositoryError> {
        let summary = sqlx::query_as::<_, Summary>(
            r"
            SELECT
                COALESCE((SELECT SUM(amount) FROM storefront.orders WHERE status = $1), 0)::bigint
                    AS total_sales,
                (SELECT COUNT(*) FROM storefront.products) AS products,
                (SELECT COUNT(*) FROM storefront.orders) AS orders,
                (SELECT COUNT(*) FROM storefront.orders WHERE status = $1) AS paid_orders,
                (SELECT COUNT(*) FROM storefront.orders WHERE status <> $1) AS unpaid_orders,
                (SELECT COUNT(*) FROM storefront.users) AS users
            ",
        )
        .bind(PaymentStatus::Paid)
        .fetch_one(self.pool)
        .await?;
        Ok(summary)
    }

    /// Paid sales per day for the seven days before `today`, oldest first.
    ///
    /// Days without sales are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_chart(&self, today: NaiveDate) -> Result<Vec<SalesPoint>, RepositoryError> {
        let (start, end) = sales_window(today);

        let rows = sqlx::query_as::<_, DailySalesRow>(
            r"
            SELECT (created_at AT TIME ZONE 'UTC')::date AS day,
                   SUM(amount)::bigint AS amount
            FROM storefront.orders
            WHERE status = $1 AND created_at >= $2 AND created_at < $3
            GROUP BY day
            ORDER BY day ASC
            ",
        )
        .bind(PaymentStatus::Paid)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| to_point(r.day, r.amount)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sales_window_excludes_today() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap_or_default();
        let (start, end) = sales_window(today);

        assert_eq!(start.to_rfc3339(), "2025-03-03T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-03-10T00:00:00+00:00");
    }

    #[test]
    fn test_sales_window_crosses_month() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap_or_default();
        let (start, _) = sales_window(today);
        assert_eq!(start.date_naive().to_string(), "2025-02-23");
    }

    #[test]
    fn test_to_point_formats_day_month() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap_or_default();
        let point = to_point(day, 12_345);
        assert_eq!(point.date, "05/01");
        assert_eq!(point.sale, Decimal::new(12_345, 2));
    }
}
