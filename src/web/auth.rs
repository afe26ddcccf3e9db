use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query, Request, State},
    http::{StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::auth::{SESSION_USER_ID_KEY, hash_password, verify_password};
use crate::db::DbError;
use crate::models::User;
use crate::web::AppServices;
use crate::web::dto;
use crate::web::errors::AppError;

#[derive(Clone)]
pub struct AuthState {
    pub services: Arc<AppServices>,
}

/// The signed-in account, injected by `require_login`.
#[derive(Clone)]
pub struct CurrentUser(pub Arc<User>);

/// Guard for the owner-scoped subtree. Anonymous requests are sent to the
/// login page with the original path in `next`, not rejected with an error.
pub async fn require_login(
    State(state): State<AuthState>,
    session: Session,
    mut req: Request,
    next: Next,
) -> Response {
    let user_id = match session.get::<i64>(SESSION_USER_ID_KEY).await {
        Ok(Some(id)) => id,
        Ok(None) => return login_redirect(req.uri()),
        Err(err) => return AppError::from(err).into_response(),
    };

    match state.services.db.get_user(user_id).await {
        Ok(user) => {
            req.extensions_mut().insert(CurrentUser(Arc::new(user)));
            next.run(req).await
        }
        // A session naming a deleted account counts as signed out.
        Err(DbError::NotFound) => login_redirect(req.uri()),
        Err(err) => AppError::from(err).into_response(),
    }
}

// Path separators and unreserved characters stay readable; everything
// else, query metacharacters included, is percent-escaped.
const NEXT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn login_redirect(uri: &Uri) -> Response {
    let next = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let next = utf8_percent_encode(next, NEXT_ENCODE_SET);
    Redirect::to(&format!("/login?next={next}")).into_response()
}

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SignupRequest>,
) -> Result<Response, AppError> {
    let username = body.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::Validation("username is required".into()));
    }
    if body.password.is_empty() {
        return Err(AppError::Validation("password is required".into()));
    }
    if services.db.get_user_by_username(&username).await?.is_some() {
        return Err(AppError::Validation(
            "A user with that username already exists.".into(),
        ));
    }

    let password_hash = hash_password(&body.password)?;
    let user = User {
        id: 0,
        username,
        password_hash,
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        company: body.company,
        address1: body.address1,
        address2: body.address2,
        country: body.country,
        phone: body.phone,
        company_logo: None,
    };
    let id = services.db.create_user(&user).await?;

    tracing::info!(user_id = id, "account created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "detail": "Account created successfully" })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    #[serde(default)]
    pub next: Option<String>,
}

/// Target of the unauthenticated redirect.
pub async fn login_page(Query(query): Query<LoginPageQuery>) -> Json<serde_json::Value> {
    Json(json!({ "detail": "Authentication required", "next": query.next }))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    session: Session,
    Json(body): Json<dto::LoginRequest>,
) -> Result<Response, AppError> {
    let user = services.db.get_user_by_username(body.username.trim()).await?;

    let Some(user) = user else {
        return Err(AppError::Validation("invalid username or password".into()));
    };
    if !verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Validation("invalid username or password".into()));
    }

    session.insert(SESSION_USER_ID_KEY, user.id).await?;

    Ok(Json(json!({
        "detail": "Logged in successfully",
        "user": dto::user_to_json(&user),
    }))
    .into_response())
}

pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    session.flush().await?;
    Ok(Redirect::to("/"))
}
