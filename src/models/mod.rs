mod client;
mod invoice;
mod invoice_item;
mod user;

pub use client::Client;
pub use invoice::{DEFAULT_TERMS, Invoice};
pub use invoice_item::InvoiceItem;
pub use user::User;
