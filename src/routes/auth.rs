/// Authentication Routes
///
/// Login, logout, token refresh, password change and current-user lookup.
/// Handlers only move data between HTTP and `SessionManager`.

use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::cookies::{
    access_cookie, refresh_cookie, refresh_token_from, removal_cookie, ACCESS_COOKIE,
    REFRESH_COOKIE,
};
use crate::auth::{AccessClaims, Credentials, IssuedTokens, SessionManager};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, RequestContext};
use crate::store::PublicUser;

/// User login request; either username or email identifies the user
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Token refresh request, for clients that do not send cookies
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(alias = "refresh_token")]
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

/// Token pair as returned in the response body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenResponse {
    fn new(tokens: IssuedTokens, jwt: &JwtSettings) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: jwt.access_token_expiry,
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

#[derive(Serialize)]
pub struct UserEnvelope {
    pub user: PublicUser,
}

fn set_token_cookies(builder: &mut HttpResponseBuilder, tokens: &IssuedTokens, jwt: &JwtSettings) {
    builder
        .cookie(access_cookie(&tokens.access_token, jwt.access_token_expiry))
        .cookie(refresh_cookie(&tokens.refresh_token, jwt.refresh_token_expiry));
}

fn clear_token_cookies(builder: &mut HttpResponseBuilder) {
    builder
        .cookie(removal_cookie(ACCESS_COOKIE))
        .cookie(removal_cookie(REFRESH_COOKIE));
}

fn subject(claims: &AccessClaims) -> Result<Uuid, AppError> {
    claims
        .user_id()
        .ok_or_else(|| AppError::Auth(AuthError::TokenInvalid))
}

/// POST /login
///
/// # Errors
/// - 400: username/email or password missing
/// - 404: no such user
/// - 401: wrong password
pub async fn login(
    form: web::Json<LoginRequest>,
    manager: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = RequestContext::new("user_login");
    let form = form.into_inner();

    let credentials = Credentials {
        username: form.username,
        email: form.email,
        password: form.password,
    };
    let outcome = manager.login(&credentials).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        user_id = %outcome.user.id,
        "User logged in successfully"
    );

    let jwt = manager.jwt_settings();
    let mut response = HttpResponse::Ok();
    set_token_cookies(&mut response, &outcome.tokens, jwt);

    Ok(response.json(LoginResponse {
        user: PublicUser::from(&outcome.user),
        tokens: TokenResponse::new(outcome.tokens, jwt),
    }))
}

/// POST /refresh-token
///
/// Reads the refresh token from the `refreshToken` cookie, or from the
/// `refreshToken` body field when no cookie was sent.
///
/// # Errors
/// - 401: missing, invalid, expired or already used refresh token
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    manager: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = RequestContext::new("token_refresh");
    let body_token = body.and_then(|b| b.into_inner().refresh_token);
    let candidate = refresh_token_from(&req, body_token.as_deref());

    let tokens = manager.refresh(candidate.as_deref()).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        session_id = %tokens.session_id,
        "Access token refreshed"
    );

    let jwt = manager.jwt_settings();
    let mut response = HttpResponse::Ok();
    set_token_cookies(&mut response, &tokens, jwt);

    Ok(response.json(TokenResponse::new(tokens, jwt)))
}

/// POST /logout
///
/// **Requires valid access token.** Clears the stored sessions and both cookies.
pub async fn logout(
    claims: web::ReqData<AccessClaims>,
    manager: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let user_id = subject(&claims)?;
    let context = RequestContext::new("user_logout").with_user_id(user_id.to_string());

    manager.logout(user_id).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        user_id = ?context.user_id,
        "User logged out"
    );

    let mut response = HttpResponse::Ok();
    clear_token_cookies(&mut response);
    Ok(response.json(serde_json::json!({ "message": "User logged out" })))
}

/// POST /change-password
///
/// **Requires valid access token.** When the session policy revokes sessions
/// on password change, the response also clears the token cookies.
///
/// # Errors
/// - 400: old or new password missing
/// - 401: old password wrong
pub async fn change_password(
    claims: web::ReqData<AccessClaims>,
    form: web::Json<ChangePasswordRequest>,
    manager: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let user_id = subject(&claims)?;
    let context = RequestContext::new("password_change").with_user_id(user_id.to_string());

    let revoked = manager
        .change_password(
            user_id,
            form.old_password.as_deref(),
            form.new_password.as_deref(),
        )
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        user_id = ?context.user_id,
        sessions_revoked = revoked,
        "Password changed"
    );

    let mut response = HttpResponse::Ok();
    if revoked {
        clear_token_cookies(&mut response);
    }
    Ok(response.json(serde_json::json!({
        "message": "Password changed",
        "sessionsRevoked": revoked,
    })))
}

/// GET /me
///
/// **Requires valid access token.**
pub async fn get_current_user(
    claims: web::ReqData<AccessClaims>,
    manager: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let user_id = subject(&claims)?;
    let user = manager.current_user(user_id).await?;

    Ok(HttpResponse::Ok().json(UserEnvelope {
        user: PublicUser::from(&user),
    }))
}
