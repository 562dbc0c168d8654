use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    content::{CurrentUser, Role},
    error::Error,
};

/// 上游认证网关写入的用户标识请求头
pub const USER_ID_HEADER: &str = "x-user-id";
/// 上游认证网关写入的用户角色请求头，缺省为 `author`
pub const USER_ROLE_HEADER: &str = "x-user-role";

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(Error::AccessDenied)?;

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            None => Role::default(),
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.parse::<Role>().ok())
                .ok_or(Error::AccessDenied)?,
        };

        Ok(CurrentUser::new(id, role))
    }
}
