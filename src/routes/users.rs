use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::{hash_password, SessionManager};
use crate::error::{AppError, RequestContext};
use crate::routes::auth::UserEnvelope;
use crate::store::{NewIdentity, PublicUser};
use crate::validators::{is_valid_email, require, require_secret};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
}

/// POST /register
///
/// Creates an identity. Does not open a session; the client logs in afterwards.
///
/// # Errors
/// - 400: a field is missing or the email is malformed
/// - 409: username or email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    manager: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = RequestContext::new("user_registration");

    let full_name = require("fullName", form.full_name.as_deref())?;
    let username = require("username", form.username.as_deref())?.to_lowercase();
    let email = is_valid_email(&require("email", form.email.as_deref())?)?;
    let password = require_secret("password", form.password.as_deref())?;

    let password_hash = hash_password(&password, manager.hash_cost())?;
    let user = manager
        .identities()
        .create(NewIdentity {
            username,
            email,
            full_name,
            password_hash,
        })
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(UserEnvelope {
        user: PublicUser::from(&user),
    }))
}
