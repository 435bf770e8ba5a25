/// Rate Limit Middleware
///
/// Charges every request against the client's fixed window before any
/// routing happens. Rejections go through `AppError` like every other error.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::security::{client_ip, RateLimiter};

pub struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
    trust_proxy_headers: bool,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<RateLimiter>, trust_proxy_headers: bool) -> Self {
        Self {
            limiter,
            trust_proxy_headers,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            trust_proxy_headers: self.trust_proxy_headers,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
    trust_proxy_headers: bool,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
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

        if let Err(e) = self.limiter.check(&client) {
            return Box::pin(async move { Err(e.into()) });
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}
