use actix_web::{
    dev::{Service, ServiceRequest, Transform},
    http::StatusCode,
    HttpResponse, ResponseError,
};
use futures_util::future::Either;
use std::{
    future::{ready, Ready},
    task::{Context, Poll},
};
use subtle::ConstantTimeEq;

use crate::error_code::ErrorCode;

const API_TOKEN_HEADER: &str = "x-api-token";

/// Guards a scope behind the configured API key
///
/// With no key configured every request is refused.
pub(crate) struct Internal(pub(crate) Option<String>);
pub(crate) struct InternalMiddleware<S>(Option<String>, S);

#[derive(Clone, Debug, thiserror::Error)]
#[error("Invalid API Key")]
pub(crate) struct ApiError;

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "msg": self.to_string(),
            "code": ErrorCode::INVALID_API_TOKEN,
        }))
    }
}

impl<S> Transform<S, ServiceRequest> for Internal
where
    S: Service<ServiceRequest, Error = actix_web::Error>,
    S::Future: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type InitError = ();
    type Transform = InternalMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(InternalMiddleware(self.0.clone(), service)))
    }
}

impl<S> Service<ServiceRequest> for InternalMiddleware<S>
where
    S: Service<ServiceRequest, Error = actix_web::Error>,
    S::Future: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Either<S::Future, Ready<Result<S::Response, S::Error>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.1.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let authorized = match (req.headers().get(API_TOKEN_HEADER), &self.0) {
            (Some(value), Some(api_key)) => value.as_bytes().ct_eq(api_key.as_bytes()).into(),
            _ => false,
        };

        if authorized {
            Either::Left(self.1.call(req))
        } else {
            tracing::debug!("Rejected request to {} without a valid api key", req.path());
            Either::Right(ready(Err(ApiError.into())))
        }
    }
}
