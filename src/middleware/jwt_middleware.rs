/// JWT Authentication Middleware
///
/// Validates the access token from the `accessToken` cookie or the
/// Authorization header and injects its claims into request extensions
/// for use by route handlers. Verification is stateless.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::cookies::{access_token_from, ACCESS_COOKIE};
use crate::auth::validate_access_token;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    jwt_config: JwtSettings,
}

impl JwtMiddleware {
    pub fn new(jwt_config: JwtSettings) -> Self {
        Self { jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let cookie = req.cookie(ACCESS_COOKIE);
        let authorization = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        let token = access_token_from(cookie.as_ref().map(|c| c.value()), authorization);

        let Some(token) = token else {
            return Box::pin(async { Err(Error::from(AppError::Auth(AuthError::MissingAccessToken))) });
        };

        match validate_access_token(&token, &self.jwt_config) {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.sub, "Access token validated");
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => Box::pin(async move { Err(Error::from(e)) }),
        }
    }
}
