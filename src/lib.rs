//! Small-business invoicing: authenticated users manage clients and
//! invoices built from line items, with cached totals kept in sync on
//! every write and PDF export of finished invoices.

pub mod auth;
pub mod config;
pub mod db;
pub mod invoice_gen;
pub mod models;
pub mod web;
