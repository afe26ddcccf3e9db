//! Repository-level coverage of the cached invoice total: the write
//! triggers that refresh it, the cases that deliberately leave it alone,
//! and the cascades around it.

use invoicing::db::{Database, DbError};
use invoicing::models::{Client, DEFAULT_TERMS, Invoice, InvoiceItem, User};

fn test_user(username: &str) -> User {
    User {
        id: 0,
        username: username.into(),
        password_hash: "unused".into(),
        first_name: "Test".into(),
        last_name: "User".into(),
        email: format!("{username}@example.com"),
        company: String::new(),
        address1: String::new(),
        address2: String::new(),
        country: String::new(),
        phone: String::new(),
        company_logo: None,
    }
}

fn test_client(owner_id: i64) -> Client {
    Client {
        id: 0,
        first_name: "Test".into(),
        last_name: "Client".into(),
        email: "client@example.com".into(),
        company: "Testco".into(),
        address1: "1234 Paradise Lane".into(),
        address2: "Good Street".into(),
        country: "US".into(),
        phone: None,
        created_by: owner_id,
    }
}

fn new_invoice(user_id: i64, client_id: i64, title: &str) -> Invoice {
    Invoice {
        id: 0,
        title: title.into(),
        user_id,
        client_id,
        invoice_total_cents: 0,
        create_date: chrono::Utc::now().date_naive(),
        invoice_terms: DEFAULT_TERMS.into(),
    }
}

fn new_item(invoice_id: i64, description: &str, quantity: i64, rate_cents: i64) -> InvoiceItem {
    InvoiceItem {
        id: 0,
        invoice_id,
        description: description.into(),
        quantity,
        rate_cents,
        tax_cents: 0,
    }
}

async fn setup() -> (Database, i64, i64) {
    let db = Database::open_in_memory().await.unwrap();
    let user_id = db.create_user(&test_user("owner")).await.unwrap();
    let client_id = db.create_client(&test_client(user_id)).await.unwrap();
    (db, user_id, client_id)
}

#[tokio::test]
async fn recording_items_refreshes_the_cached_total() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .record_invoice(&new_invoice(user_id, client_id, "Test Invoice 1"))
        .await
        .unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(invoice.invoice_total_cents, 0);

    db.record_item(&new_item(invoice_id, "Test Item 1", 3, 2000))
        .await
        .unwrap();
    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(invoice.invoice_total_cents, 6000);

    db.record_item(&new_item(invoice_id, "Test Item 2", 1, 2000))
        .await
        .unwrap();
    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(invoice.invoice_total_cents, 8000);
    assert_eq!(invoice.total().to_string(), "80.00");
    assert_eq!(invoice.to_string(), "Test Invoice 1 - 80.00");
}

#[tokio::test]
async fn updating_an_item_recomputes_the_full_sum() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .save_invoice_with_items(
            &new_invoice(user_id, client_id, "Invoice"),
            &[new_item(0, "Work", 3, 2000)],
        )
        .await
        .unwrap();

    let mut item = db.get_invoice_items(invoice_id).await.unwrap().remove(0);
    item.quantity = 5;
    item.rate_cents = 1000;
    db.record_item(&item).await.unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(invoice.invoice_total_cents, 5000);
}

#[tokio::test]
async fn updating_a_missing_item_is_not_found() {
    let (db, _user_id, _client_id) = setup().await;

    let mut item = new_item(1, "Ghost", 1, 1000);
    item.id = 99;

    assert!(matches!(db.record_item(&item).await, Err(DbError::NotFound)));
}

#[tokio::test]
async fn tax_never_affects_the_total() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .record_invoice(&new_invoice(user_id, client_id, "Invoice"))
        .await
        .unwrap();

    let mut item = new_item(invoice_id, "Taxed work", 2, 1000);
    item.tax_cents = 500;
    db.record_item(&item).await.unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(invoice.invoice_total_cents, 2000);
}

#[tokio::test]
async fn zero_subtotal_items_do_not_overwrite_the_total() {
    let (db, user_id, client_id) = setup().await;

    // All-zero item set: the aggregate is 0, the cached default survives.
    let invoice_id = db
        .record_invoice(&new_invoice(user_id, client_id, "Invoice"))
        .await
        .unwrap();
    db.record_item(&new_item(invoice_id, "Nothing yet", 0, 2000))
        .await
        .unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(invoice.invoice_total_cents, 0);

    // A non-zero total stays put when the replacement set sums to zero.
    let mut edit = invoice.clone();
    edit.title = "Invoice".into();
    db.record_item(&new_item(invoice_id, "Real work", 4, 2000))
        .await
        .unwrap();
    db.save_invoice_with_items(&edit, &[new_item(0, "Placeholder", 0, 2000)])
        .await
        .unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(invoice.invoice_total_cents, 8000);
}

#[tokio::test]
async fn cached_total_survives_emptying_the_item_set() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .save_invoice_with_items(
            &new_invoice(user_id, client_id, "Invoice"),
            &[
                new_item(0, "Test Item 1", 3, 2000),
                new_item(0, "Test Item 2", 1, 2000),
            ],
        )
        .await
        .unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(invoice.invoice_total_cents, 8000);

    db.save_invoice_with_items(&invoice, &[]).await.unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert!(db.get_invoice_items(invoice_id).await.unwrap().is_empty());
    assert_eq!(invoice.invoice_total_cents, 8000);
}

#[tokio::test]
async fn computed_total_is_fresh() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .save_invoice_with_items(
            &new_invoice(user_id, client_id, "Invoice"),
            &[new_item(0, "Work", 3, 2000)],
        )
        .await
        .unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(db.computed_total(&invoice).await.unwrap(), 6000);

    db.save_invoice_with_items(&invoice, &[]).await.unwrap();
    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();

    // Stale cache, fresh recomputation.
    assert_eq!(invoice.invoice_total_cents, 6000);
    assert_eq!(db.computed_total(&invoice).await.unwrap(), 0);

    // An unsaved invoice falls back to its struct value.
    let mut unsaved = new_invoice(user_id, client_id, "Draft");
    unsaved.invoice_total_cents = 4321;
    assert_eq!(db.computed_total(&unsaved).await.unwrap(), 4321);
}

#[tokio::test]
async fn record_invoice_refreshes_a_stale_total_when_items_exist() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .save_invoice_with_items(
            &new_invoice(user_id, client_id, "Invoice"),
            &[new_item(0, "Work", 4, 2000)],
        )
        .await
        .unwrap();

    // Drift the cache behind the repository's back.
    sqlx::query("UPDATE invoices SET invoice_total_cents = 1 WHERE id = ?")
        .bind(invoice_id)
        .execute(db.get_pool())
        .await
        .unwrap();

    let mut invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    invoice.title = "Invoice, renamed".into();
    db.record_invoice(&invoice).await.unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(invoice.title, "Invoice, renamed");
    assert_eq!(invoice.invoice_total_cents, 8000);
}

#[tokio::test]
async fn record_invoice_update_leaves_create_date_and_total_alone() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .save_invoice_with_items(
            &new_invoice(user_id, client_id, "Invoice"),
            &[new_item(0, "Work", 1, 2000)],
        )
        .await
        .unwrap();
    let original = db.get_invoice(invoice_id, user_id).await.unwrap();

    let mut edit = original.clone();
    edit.title = "Renamed".into();
    edit.invoice_terms = "Due on receipt".into();
    // Caller-supplied values for the stamped fields are ignored.
    edit.create_date = chrono::NaiveDate::from_ymd_opt(1999, 1, 1).unwrap();
    edit.invoice_total_cents = 99;
    db.record_invoice(&edit).await.unwrap();

    let updated = db.get_invoice(invoice_id, user_id).await.unwrap();
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.invoice_terms, "Due on receipt");
    assert_eq!(updated.create_date, original.create_date);
    assert_eq!(updated.invoice_total_cents, 2000);
}

#[tokio::test]
async fn replacing_the_item_set_recomputes_the_total() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .save_invoice_with_items(
            &new_invoice(user_id, client_id, "Invoice"),
            &[new_item(0, "Old work", 3, 2000)],
        )
        .await
        .unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    db.save_invoice_with_items(
        &invoice,
        &[
            new_item(0, "New work", 5, 1000),
            new_item(0, "Extras", 2, 250),
        ],
    )
    .await
    .unwrap();

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    let items = db.get_invoice_items(invoice_id).await.unwrap();
    assert_eq!(invoice.invoice_total_cents, 5500);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].description, "New work");
}

#[tokio::test]
async fn failed_save_persists_nothing() {
    let (db, user_id, client_id) = setup().await;

    // The second item's quantity * rate_cents overflows the 64-bit sum, so
    // the total refresh fails after both inserts.
    let result = db
        .save_invoice_with_items(
            &new_invoice(user_id, client_id, "Invoice"),
            &[
                new_item(0, "Work", 3, 2000),
                new_item(0, "Runaway", 10_000_000_000_000_000, 2000),
            ],
        )
        .await;

    assert!(result.is_err());
    assert!(db.get_invoices(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_edit_keeps_the_previous_item_set() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .save_invoice_with_items(
            &new_invoice(user_id, client_id, "Invoice"),
            &[new_item(0, "Old work", 3, 2000)],
        )
        .await
        .unwrap();

    let mut edit = db.get_invoice(invoice_id, user_id).await.unwrap();
    edit.title = "Renamed".into();
    let result = db
        .save_invoice_with_items(&edit, &[new_item(0, "Runaway", 10_000_000_000_000_000, 2000)])
        .await;
    assert!(result.is_err());

    let invoice = db.get_invoice(invoice_id, user_id).await.unwrap();
    let items = db.get_invoice_items(invoice_id).await.unwrap();
    assert_eq!(invoice.title, "Invoice");
    assert_eq!(invoice.invoice_total_cents, 6000);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].description, "Old work");
}

#[tokio::test]
async fn owner_scope_hides_foreign_records() {
    let (db, owner_id, client_id) = setup().await;
    let intruder_id = db.create_user(&test_user("intruder")).await.unwrap();

    let invoice_id = db
        .save_invoice_with_items(
            &new_invoice(owner_id, client_id, "Invoice"),
            &[new_item(0, "Work", 1, 2000)],
        )
        .await
        .unwrap();

    assert!(matches!(
        db.get_invoice(invoice_id, intruder_id).await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        db.get_client(client_id, intruder_id).await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        db.delete_invoice(invoice_id, intruder_id).await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        db.delete_client(client_id, intruder_id).await,
        Err(DbError::NotFound)
    ));

    let mut foreign_edit = db.get_invoice(invoice_id, owner_id).await.unwrap();
    foreign_edit.user_id = intruder_id;
    foreign_edit.title = "Hijacked".into();
    assert!(matches!(
        db.record_invoice(&foreign_edit).await,
        Err(DbError::NotFound)
    ));
}

#[tokio::test]
async fn deleting_a_client_cascades_to_its_invoices_and_items() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .save_invoice_with_items(
            &new_invoice(user_id, client_id, "Invoice"),
            &[new_item(0, "Work", 2, 1500)],
        )
        .await
        .unwrap();

    db.delete_client(client_id, user_id).await.unwrap();

    assert!(matches!(
        db.get_invoice(invoice_id, user_id).await,
        Err(DbError::NotFound)
    ));
    assert!(db.get_invoice_items(invoice_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_user_cascades_to_clients_and_invoices() {
    let (db, user_id, client_id) = setup().await;

    let invoice_id = db
        .save_invoice_with_items(
            &new_invoice(user_id, client_id, "Invoice"),
            &[new_item(0, "Work", 2, 1500)],
        )
        .await
        .unwrap();

    db.delete_user(user_id).await.unwrap();

    assert!(db.get_clients(user_id).await.unwrap().is_empty());
    assert!(matches!(
        db.get_invoice(invoice_id, user_id).await,
        Err(DbError::NotFound)
    ));
    assert!(db.get_invoice_items(invoice_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn recent_invoices_pages_newest_first() {
    let (db, user_id, client_id) = setup().await;

    let mut ids = Vec::new();
    for n in 1..=12 {
        let id = db
            .record_invoice(&new_invoice(user_id, client_id, &format!("Invoice {n}")))
            .await
            .unwrap();
        ids.push(id);
    }

    let first_page = db.recent_invoices(user_id, 10, 0).await.unwrap();
    let second_page = db.recent_invoices(user_id, 10, 10).await.unwrap();

    assert_eq!(first_page.len(), 10);
    assert_eq!(second_page.len(), 2);
    assert_eq!(first_page[0].id, *ids.last().unwrap());
    assert_eq!(second_page[1].id, ids[0]);
}
