use crate::AuthError;

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// A missing header, another scheme, or an empty token are all
/// `Unauthenticated`.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::Unauthenticated)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::Unauthenticated)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::Unauthenticated);
    }

    Ok(token)
}
