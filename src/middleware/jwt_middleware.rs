/// JWT Authentication Middleware
///
/// Validates the bearer access token and injects the resulting `Principal`
/// into request extensions; handlers take it as `web::ReqData<Principal>`.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::error::{AppError, AuthError};

const BEARER_PREFIX: &str = "Bearer ";

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    auth: Arc<AuthService>,
}

impl JwtMiddleware {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
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
            auth: self.auth.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    auth: Arc<AuthService>,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
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
        let token = match bearer_token(&req) {
            Some(token) => token,
            None => {
                tracing::warn!(path = %req.path(), "Missing or invalid Authorization header");
                return Box::pin(async move { Err(AppError::Auth(AuthError::MissingToken).into()) });
            }
        };

        match self.auth.validate_access_token(&token) {
            Ok(principal) => {
                tracing::debug!(subject = %principal.subject, "Access token validated");
                req.extensions_mut().insert(principal);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => Box::pin(async move { Err(e.into()) }),
        }
    }
}
