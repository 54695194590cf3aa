use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::auth::extractors::bearer_token;
use crate::auth::token::Claims;
use crate::domain::{DomainError, RepositoryError};
use crate::error::AppError;
use crate::state::AppState;

/// Routes reachable without a bearer token.
const PUBLIC_PATHS: [&str; 4] = [
    "/health",
    "/api/v1/auth/login",
    "/api/v1/auth/register",
    "/api/v1/auth/refresh",
];

/// Requires a valid access token whose user may still act. The accepted
/// `Claims` are stored in the request extensions. Rejections are answered
/// here with the JSON error envelope so outer middleware still sees them.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path().trim_end_matches('/');
        if PUBLIC_PATHS.contains(&path) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            match authorize(&req).await {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(err) => {
                    let response = err.error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

async fn authorize(req: &ServiceRequest) -> Result<Claims, AppError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::InternalServerError("application state missing".into()))?;
    let token = bearer_token(req.request())
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

    let cancel = state.shutdown.child_token();
    let claims = state
        .tokens
        .validate_access_token(&cancel, &token)
        .map_err(|e| AppError::from(DomainError::from(e)))?;

    let user = match state.users.find_by_id(claims.user_id).await {
        Ok(user) => user,
        Err(RepositoryError::NotFound(_)) => {
            return Err(AppError::Unauthorized("user no longer exists".into()))
        }
        Err(e) => return Err(AppError::from(DomainError::from(e))),
    };
    if !user.can_act() {
        return Err(AppError::from(DomainError::UserNotActive));
    }
    Ok(claims)
}
