//! Form extraction
//!
//! Reads fields from the query string and, for non-GET requests with an
//! `application/x-www-form-urlencoded` body, from the body as well.

use axum::{
    extract::{rejection::FormRejection, FromRequest, Query, Request},
    http::{header, HeaderMap, Method, StatusCode},
    Form,
};

use super::routes::AppError;
use crate::render::{FormFields, RenderError};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Form fields of a conversion request
#[derive(Debug, Clone)]
pub struct SubmittedForm(pub FormFields);

fn is_form_body(method: &Method, headers: &HeaderMap) -> bool {
    if *method == Method::GET || *method == Method::HEAD {
        return false;
    }
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

fn invalid(message: String) -> AppError {
    AppError::from(RenderError::InvalidRequest(format!(
        "failed to parse form: {}",
        message
    )))
}

/// Over-limit bodies keep their 413, everything else is a malformed form
fn body_rejection(rejection: FormRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(rejection.body_text())
    } else {
        invalid(rejection.body_text())
    }
}

impl<S> FromRequest<S> for SubmittedForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let query = match req.uri().query() {
            Some(_) => {
                Query::<Vec<(String, String)>>::try_from_uri(req.uri())
                    .map_err(|e| invalid(e.body_text()))?
                    .0
            }
            None => Vec::new(),
        };

        let body = if is_form_body(req.method(), req.headers()) {
            Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(body_rejection)?
                .0
        } else {
            Vec::new()
        };

        Ok(SubmittedForm(FormFields::from_parts(body, query)))
    }
}
