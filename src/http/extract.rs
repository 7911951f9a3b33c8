//! Request extractors: the authenticated caller and validated JSON bodies.

use axum::extract::{FromRequest, FromRequestParts, Json, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::error::AppError;
use super::state::AppState;
use crate::access::{require_admin, Identity};

/// The caller behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Identity,
    pub email: String,
}

/// A caller that passed [`require_admin`].
#[derive(Debug, Clone)]
pub struct AdminCaller(pub Caller);

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

fn rejected(reason: &'static str) -> AppError {
    metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
    AppError::Unauthorized(reason)
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| rejected("missing bearer token"))?;
        let claims = state
            .tokens
            .verify(token)
            .map_err(|_| rejected("invalid or expired token"))?;
        let identity = claims
            .identity()
            .map_err(|_| rejected("invalid or expired token"))?;

        match identity {
            Identity::Admin => Ok(Caller {
                identity,
                email: state.config.admin.email.clone(),
            }),
            // The account must still exist; deleted customers lose access at once.
            Identity::Customer(id) => {
                let user = state
                    .engine
                    .user(&id)
                    .await
                    .ok_or_else(|| rejected("account no longer exists"))?;
                Ok(Caller {
                    identity,
                    email: user.email,
                })
            }
        }
    }
}

impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        require_admin(&caller.identity)?;
        Ok(AdminCaller(caller))
    }
}

/// JSON body that also passed its `validator` rules.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = HttpRequest::builder().uri("/api/auth/me");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer(&parts(Some("Bearer abc.def.ghi"))), Some("abc.def.ghi"));
        assert_eq!(bearer(&parts(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer(&parts(Some("Basic dXNlcjpwYXNz"))), None);
        assert_eq!(bearer(&parts(Some("Bearer"))), None);
        assert_eq!(bearer(&parts(None)), None);
    }
}
