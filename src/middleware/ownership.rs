use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::HttpMessage;
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    rc::Rc,
    task::{Context, Poll},
};

use crate::ingest::authorize;

/// Resolves the `{video_id}` of the matched resource and refuses callers that don't own it
///
/// Runs before any extractor touches the body, so a bad payload never hides an ownership
/// failure. The loaded `VideoRecord` is left in the request extensions.
pub(crate) struct Ownership;
pub(crate) struct OwnershipMiddleware<S>(Rc<S>);

impl<S, B> Transform<S, ServiceRequest> for Ownership
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = OwnershipMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(OwnershipMiddleware(Rc::new(service))))
    }
}

impl<S, B> Service<ServiceRequest> for OwnershipMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.0);

        Box::pin(async move {
            let state = crate::request_state(req.request());

            let record = authorize(&state, req.match_info().query("video_id"), req.headers())
                .await
                .map_err(actix_web::Error::from)?;

            req.extensions_mut().insert(record);

            service.call(req).await
        })
    }
}
