use axum::extract::FromRequest;

use crate::error::Error;

/// `Json` whose rejections come back as the API's error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct ApiJson<T>(pub T);
