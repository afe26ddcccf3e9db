use rust_decimal::Decimal;

/// Line item belonging to one invoice. Amounts are stored as integer cents;
/// `tax_cents` is recorded but excluded from every total.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub description: String,
    pub quantity: i64,
    pub rate_cents: i64,
    pub tax_cents: i64,
}

impl InvoiceItem {
    pub fn rate(&self) -> Decimal {
        Decimal::new(self.rate_cents, 2)
    }

    pub fn tax(&self) -> Decimal {
        Decimal::new(self.tax_cents, 2)
    }

    /// Quantity times rate, tax not included.
    pub fn subtotal(&self) -> Decimal {
        Decimal::new(self.quantity * self.rate_cents, 2)
    }
}

impl std::fmt::Display for InvoiceItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.description, self.subtotal())
    }
}
