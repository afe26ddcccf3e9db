use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::auth::SESSION_USER_ID_KEY;
use crate::invoice_gen::RenderContext;
use crate::web::AppServices;
use crate::web::auth::CurrentUser;
use crate::web::dto;
use crate::web::errors::AppError;

const HOME_PAGE_SIZE: i64 = 10;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices))
        .route("/new", get(new_invoice_page).post(create_invoice))
        .route("/{id}", get(invoice_detail))
        .route("/edit/{id}", get(edit_invoice_page).post(update_invoice))
        .route("/delete/{id}", get(delete_invoice_page).post(delete_invoice))
        .route("/generate/{id}", get(generate_invoice))
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Public landing page: a page of the caller's invoices, newest first,
/// with the first four called out as recent. Anonymous callers get empty
/// lists rather than a redirect.
pub async fn home(
    Extension(services): Extension<Arc<AppServices>>,
    session: Session,
    Query(query): Query<HomeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let page = query.page.max(1);

    let invoices = match session.get::<i64>(SESSION_USER_ID_KEY).await? {
        Some(user_id) => {
            let offset = (i64::from(page) - 1) * HOME_PAGE_SIZE;
            services
                .db
                .recent_invoices(user_id, HOME_PAGE_SIZE, offset)
                .await?
        }
        None => Vec::new(),
    };

    let invoices: Vec<_> = invoices.iter().map(dto::invoice_to_json).collect();
    let recent_invoices: Vec<_> = invoices.iter().take(4).cloned().collect();

    Ok(Json(json!({
        "invoices": invoices,
        "recent_invoices": recent_invoices,
        "page": page,
    })))
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let invoices = services.db.get_invoices(user.id).await?;

    Ok(Json(json!({
        "invoices": invoices.iter().map(dto::invoice_to_json).collect::<Vec<_>>(),
    })))
}

/// Form context for a new invoice: the caller's client choices and a
/// single blank item row.
pub async fn new_invoice_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let clients = services.db.get_clients(user.id).await?;

    Ok(Json(json!({
        "clients": clients.iter().map(dto::client_to_json).collect::<Vec<_>>(),
        "items": [dto::blank_item_row()],
    })))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<dto::InvoiceForm>,
) -> Result<Response, AppError> {
    let (invoice, items) = body.into_records(user.id)?;

    // The billed client must be the caller's own.
    services.db.get_client(invoice.client_id, user.id).await?;

    let id = services.db.save_invoice_with_items(&invoice, &items).await?;

    tracing::info!(invoice_id = id, user_id = user.id, "invoice created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/invoices/{id}"))],
        Json(json!({ "id": id })),
    )
        .into_response())
}

pub async fn invoice_detail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (invoice, items) = services.db.get_invoice_with_items(id, user.id).await?;
    let client = services.db.get_client(invoice.client_id, user.id).await?;

    Ok(Json(json!({
        "invoice": dto::invoice_to_json(&invoice),
        "client": dto::client_to_json(&client),
        "invoice_items": items.iter().map(dto::item_to_json).collect::<Vec<_>>(),
        "user": dto::user_to_json(&user),
    })))
}

/// Edit context: current fields, existing items plus a blank extra row,
/// and the caller's client choices.
pub async fn edit_invoice_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (invoice, items) = services.db.get_invoice_with_items(id, user.id).await?;
    let clients = services.db.get_clients(user.id).await?;

    let mut item_rows: Vec<_> = items.iter().map(dto::item_to_json).collect();
    item_rows.push(dto::blank_item_row());

    Ok(Json(json!({
        "invoice": dto::invoice_to_json(&invoice),
        "clients": clients.iter().map(dto::client_to_json).collect::<Vec<_>>(),
        "items": item_rows,
    })))
}

/// Replaces the invoice's fields and its whole item set.
pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<dto::InvoiceForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    let existing = services.db.get_invoice(id, user.id).await?;

    let (mut invoice, items) = body.into_records(user.id)?;
    services.db.get_client(invoice.client_id, user.id).await?;

    invoice.id = existing.id;
    let id = services.db.save_invoice_with_items(&invoice, &items).await?;

    Ok(Json(json!({ "id": id })))
}

pub async fn delete_invoice_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let invoice = services.db.get_invoice(id, user.id).await?;

    Ok(Json(json!({ "invoice": dto::invoice_to_json(&invoice) })))
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    services.db.delete_invoice(id, user.id).await?;

    tracing::info!(invoice_id = id, user_id = user.id, "invoice deleted");

    Ok(Json(json!({ "deleted": true })))
}

/// Render the invoice to PDF and hand it back as a download.
pub async fn generate_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let (invoice, items) = services.db.get_invoice_with_items(id, user.id).await?;
    let client = services.db.get_client(invoice.client_id, user.id).await?;

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");

    let ctx = RenderContext {
        invoice: &invoice,
        items: &items,
        client: &client,
        user: &user,
        host,
    };
    let pdf = services.generator.generate(&ctx)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=invoice_{}.pdf", invoice.id),
            ),
        ],
        pdf,
    )
        .into_response())
}
