use rust_decimal::Decimal;

/// Terms applied to a new invoice when the caller leaves the field blank.
pub const DEFAULT_TERMS: &str =
    "NET 30 Days. Finance Charge of 1.5% will be made on unpaid balances after 30 days.";

/// Invoice header row. `invoice_total_cents` is a cached sum maintained by
/// the save paths in `db`; it is not recomputed on read. An `id` of 0 marks
/// a row that has not been persisted yet.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Invoice {
    pub id: i64,
    pub title: String,
    pub user_id: i64,
    pub client_id: i64,
    pub invoice_total_cents: i64,
    pub create_date: chrono::NaiveDate,
    pub invoice_terms: String,
}

impl Invoice {
    /// Cached total as a two-decimal amount.
    pub fn total(&self) -> Decimal {
        Decimal::new(self.invoice_total_cents, 2)
    }

    pub fn is_saved(&self) -> bool {
        self.id != 0
    }

    pub fn absolute_url(&self) -> String {
        format!("/invoices/{}", self.id)
    }
}

impl std::fmt::Display for Invoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.title, self.total())
    }
}
