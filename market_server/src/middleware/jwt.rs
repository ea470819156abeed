//! Bearer token middleware.
//!
//! If the request carries an `Authorization` header, the token is validated and its claims are stored in the request
//! extensions for the [`crate::auth::Identity`] extractor and the ACL middleware. Requests without the header pass
//! through untouched and are treated as anonymous. A header with an invalid token is rejected with a 401 (or 400 if
//! it is not a bearer token at all); it is never silently downgraded to anonymous.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{debug, trace};

use crate::{
    auth::TokenValidator,
    errors::{AuthError, ServerError},
};

pub struct JwtMiddlewareFactory {
    validator: TokenValidator,
}

impl JwtMiddlewareFactory {
    pub fn new(validator: TokenValidator) -> Self {
        JwtMiddlewareFactory { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { validator: self.validator.clone(), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    validator: TokenValidator,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let header = req.headers().get(AUTHORIZATION).map(|v| v.to_str().map(str::to_string));
        let validator = self.validator.clone();
        Box::pin(async move {
            match header {
                None => {
                    trace!("🔐️ No access token in request. Continuing anonymously.");
                },
                Some(Err(e)) => {
                    debug!("🔐️ Authorization header is not valid ASCII. {e}");
                    return Err(ServerError::AuthenticationError(AuthError::PoorlyFormattedToken(e.to_string())).into());
                },
                Some(Ok(value)) => {
                    let claims = validator.validate_header(&value).map_err(|e| {
                        debug!("🔐️ Rejecting request with invalid access token. {e}");
                        ServerError::AuthenticationError(e)
                    })?;
                    req.extensions_mut().insert(claims);
                },
            }
            service.call(req).await
        })
    }
}
