//! Request DTOs, their validation, and the JSON shapes handlers respond
//! with. Invoice submissions are validated as a whole before anything is
//! persisted; a bad line item rejects the entire request.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::models::{Client, DEFAULT_TERMS, Invoice, InvoiceItem, User};
use crate::web::errors::AppError;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ClientForm {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ClientForm {
    /// Validate and convert into a client owned by `user_id`. The record
    /// is unsaved (`id == 0`); edits overwrite the id afterwards.
    pub fn into_client(self, user_id: i64) -> Result<Client, AppError> {
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(AppError::Validation(
                "first_name and last_name are required".into(),
            ));
        }

        Ok(Client {
            id: 0,
            first_name,
            last_name,
            email: self.email,
            company: self.company,
            address1: self.address1,
            address2: self.address2,
            country: self.country,
            phone: self.phone,
            created_by: user_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct InvoiceForm {
    pub title: String,
    pub client_id: i64,
    #[serde(default)]
    pub invoice_terms: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemForm>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemForm {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub rate: Option<Decimal>,
    #[serde(default)]
    pub tax: Option<Decimal>,
}

impl ItemForm {
    /// An untouched extra form row; dropped rather than rejected.
    fn is_blank(&self) -> bool {
        self.description.trim().is_empty()
            && self.quantity == 0
            && self.rate.is_none()
            && self.tax.is_none()
    }

    fn to_item(&self, index: usize) -> Result<InvoiceItem, AppError> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(AppError::Validation(format!(
                "item {}: description is required",
                index + 1
            )));
        }

        // 32-bit form field bound; with the rate bound this also keeps
        // quantity * rate_cents inside i64.
        if i32::try_from(self.quantity).is_err() {
            return Err(AppError::Validation(format!(
                "item {}: quantity is out of range",
                index + 1
            )));
        }

        let Some(rate) = self.rate else {
            return Err(AppError::Validation(format!(
                "item {}: rate is required",
                index + 1
            )));
        };
        let rate_cents = decimal_to_cents(rate, &format!("item {}: rate", index + 1))?;
        let tax_cents = match self.tax {
            Some(tax) => decimal_to_cents(tax, &format!("item {}: tax", index + 1))?,
            None => 0,
        };

        Ok(InvoiceItem {
            id: 0,
            invoice_id: 0,
            description: description.to_string(),
            quantity: self.quantity,
            rate_cents,
            tax_cents,
        })
    }
}

impl InvoiceForm {
    /// Validate the whole submission and convert it into an unsaved invoice
    /// plus its line items. Any invalid item fails the conversion; nothing
    /// reaches the database on that path.
    pub fn into_records(self, user_id: i64) -> Result<(Invoice, Vec<InvoiceItem>), AppError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("title is required".into()));
        }

        let invoice_terms = match self.invoice_terms.as_deref().map(str::trim) {
            Some(terms) if !terms.is_empty() => terms.to_string(),
            _ => DEFAULT_TERMS.to_string(),
        };

        let mut items = Vec::new();
        for (index, form) in self.items.iter().enumerate() {
            if form.is_blank() {
                continue;
            }
            items.push(form.to_item(index)?);
        }

        let invoice = Invoice {
            id: 0,
            title,
            user_id,
            client_id: self.client_id,
            invoice_total_cents: 0,
            create_date: chrono::Utc::now().date_naive(),
            invoice_terms,
        };

        Ok((invoice, items))
    }
}

/// Convert a decimal amount into cents. At most two decimal places and at
/// most six digits in total (|value| <= 9999.99).
pub fn decimal_to_cents(value: Decimal, field: &str) -> Result<i64, AppError> {
    if value.scale() > 2 {
        return Err(AppError::Validation(format!(
            "{field} allows at most 2 decimal places"
        )));
    }
    if value.abs() > Decimal::new(999_999, 2) {
        return Err(AppError::Validation(format!(
            "{field} allows at most 6 digits in total"
        )));
    }

    let mut scaled = value;
    scaled.rescale(2);

    Ok(scaled.mantissa() as i64)
}

// JSON shapes mirroring the view contexts the pages consume.

pub fn user_to_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "display": user.to_string(),
        "first_name": user.first_name,
        "last_name": user.last_name,
        "email": user.email,
        "company": user.company,
        "address1": user.address1,
        "address2": user.address2,
        "country": user.country,
        "phone": user.phone,
        "company_logo": user.company_logo,
    })
}

pub fn client_to_json(client: &Client) -> Value {
    json!({
        "id": client.id,
        "first_name": client.first_name,
        "last_name": client.last_name,
        "email": client.email,
        "company": client.company,
        "address1": client.address1,
        "address2": client.address2,
        "country": client.country,
        "phone": client.phone,
        "display": client.to_string(),
        "url": client.absolute_url(),
    })
}

pub fn invoice_to_json(invoice: &Invoice) -> Value {
    json!({
        "id": invoice.id,
        "title": invoice.title,
        "client_id": invoice.client_id,
        "invoice_total": invoice.total(),
        "create_date": invoice.create_date,
        "invoice_terms": invoice.invoice_terms,
        "display": invoice.to_string(),
        "url": invoice.absolute_url(),
    })
}

pub fn item_to_json(item: &InvoiceItem) -> Value {
    json!({
        "id": item.id,
        "invoice_id": item.invoice_id,
        "description": item.description,
        "quantity": item.quantity,
        "rate": item.rate(),
        "tax": item.tax(),
        "subtotal": item.subtotal(),
        "display": item.to_string(),
    })
}

/// The empty extra row form pages append after the existing items.
pub fn blank_item_row() -> Value {
    json!({ "description": "", "quantity": 0, "rate": null, "tax": null })
}

pub fn blank_client_row() -> Value {
    json!({
        "first_name": "",
        "last_name": "",
        "email": "",
        "company": "",
        "address1": "",
        "address2": "",
        "country": "",
        "phone": null,
    })
}
