/// Brute-Force Middleware
///
/// Wraps the /auth scope. Every request counts as one attempt for the
/// client; the resolved identifier is left in request extensions as
/// `ClientId` so handlers can reset it after a successful login.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::security::{client_ip, BruteForceGuard};

/// Client identifier the guard charged for this request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

pub struct BruteForceMiddleware {
    guard: Arc<BruteForceGuard>,
    trust_proxy_headers: bool,
}

impl BruteForceMiddleware {
    pub fn new(guard: Arc<BruteForceGuard>, trust_proxy_headers: bool) -> Self {
        Self {
            guard,
            trust_proxy_headers,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BruteForceMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = BruteForceMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(BruteForceMiddlewareService {
            service: Rc::new(service),
            guard: self.guard.clone(),
            trust_proxy_headers: self.trust_proxy_headers,
        }))
    }
}

pub struct BruteForceMiddlewareService<S> {
    service: Rc<S>,
    guard: Arc<BruteForceGuard>,
    trust_proxy_headers: bool,
}

impl<S, B> Service<ServiceRequest> for BruteForceMiddlewareService<S>
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
        let client = client_ip(&req, self.trust_proxy_headers);

        if let Err(e) = self.guard.record_attempt(&client) {
            return Box::pin(async move { Err(e.into()) });
        }

        req.extensions_mut().insert(ClientId(client));

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}
