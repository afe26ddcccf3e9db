use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use crate::web::AppServices;
use crate::web::auth::CurrentUser;
use crate::web::dto;
use crate::web::errors::AppError;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_clients))
        .route("/new", get(new_client_page).post(create_client))
        .route("/{id}", get(client_detail))
        .route("/edit/{id}", get(edit_client_page).post(update_client))
        .route("/delete/{id}", get(delete_client_page).post(delete_client))
}

pub async fn list_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let clients = services.db.get_clients(user.id).await?;

    Ok(Json(json!({
        "clients": clients.iter().map(dto::client_to_json).collect::<Vec<_>>(),
    })))
}

pub async fn new_client_page() -> Json<serde_json::Value> {
    Json(json!({ "client": dto::blank_client_row() }))
}

pub async fn create_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<dto::ClientForm>,
) -> Result<Response, AppError> {
    let client = body.into_client(user.id)?;
    let id = services.db.create_client(&client).await?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/clients/{id}"))],
        Json(json!({ "id": id })),
    )
        .into_response())
}

/// Detail context includes the invoices billed to this client.
pub async fn client_detail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let client = services.db.get_client(id, user.id).await?;
    let invoices = services.db.get_invoices_by_client(id, user.id).await?;

    Ok(Json(json!({
        "client": dto::client_to_json(&client),
        "invoices": invoices.iter().map(dto::invoice_to_json).collect::<Vec<_>>(),
    })))
}

pub async fn edit_client_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let client = services.db.get_client(id, user.id).await?;

    Ok(Json(json!({ "client": dto::client_to_json(&client) })))
}

pub async fn update_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<dto::ClientForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    let existing = services.db.get_client(id, user.id).await?;

    let mut client = body.into_client(user.id)?;
    client.id = existing.id;
    services.db.update_client(&client).await?;

    Ok(Json(json!({ "id": client.id })))
}

pub async fn delete_client_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let client = services.db.get_client(id, user.id).await?;

    Ok(Json(json!({ "client": dto::client_to_json(&client) })))
}

pub async fn delete_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    services.db.delete_client(id, user.id).await?;

    tracing::info!(client_id = id, user_id = user.id, "client deleted");

    Ok(Json(json!({ "deleted": true })))
}
