//! Error responses in the uniform `{success, error, message}` shape

use axum_core::{body::Body, response::Response};
use http::{header, HeaderValue, StatusCode};
use tapster_oauth2::PermissionRef;

/// Builds a JSON error response
///
/// ```json
/// {"success": false, "error": 404, "message": "Resource is not found"}
/// ```
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({
        "success": false,
        "error": status.as_u16(),
        "message": message,
    });

    let mut resp = Response::new(Body::from(body.to_string()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

/// A `Bearer error="invalid_token"` challenge
///
/// The description is escaped so that it is always header-friendly, and
/// `error_description` is omitted if it is empty.
pub fn invalid_token(description: &str) -> HeaderValue {
    bearer_challenge("invalid_token", description, None)
}

/// A `Bearer error="insufficient_scope"` challenge naming the missing
/// permission, if there is one
pub fn insufficient_scope(description: &str, permission: Option<&PermissionRef>) -> HeaderValue {
    bearer_challenge("insufficient_scope", description, permission)
}

/// A `Bearer error="invalid_request"` challenge
pub fn invalid_request(description: &str) -> HeaderValue {
    bearer_challenge("invalid_request", description, None)
}

// A `Permission` is printable ASCII without `\` or `"`, so it never needs
// escaping.
fn bearer_challenge(
    error: &'static str,
    description: &str,
    permission: Option<&PermissionRef>,
) -> HeaderValue {
    let mut value = format!(r#"Bearer error="{error}""#);
    if !description.is_empty() {
        value.push_str(&format!(
            r#" error_description="{}""#,
            description.escape_default()
        ));
    }
    if let Some(permission) = permission {
        value.push_str(&format!(r#" scope="{permission}""#));
    }

    HeaderValue::try_from(value).unwrap_or_else(|_| match error {
        "insufficient_scope" => HeaderValue::from_static(r#"Bearer error="insufficient_scope""#),
        "invalid_request" => HeaderValue::from_static(r#"Bearer error="invalid_request""#),
        _ => HeaderValue::from_static(r#"Bearer error="invalid_token""#),
    })
}

#[cfg(test)]
mod tests {
    use tapster_oauth2::Permission;

    use super::*;

    #[test]
    fn invalid_token_with_unicode_and_non_printing_description_is_escaped() {
        let value = invalid_token(
            "\0\n\ttest™: \"Ĉu oni povas bone ŝanĝi ĉi tiu mesaĝon en respondon?\"",
        );

        assert_eq!(
            value.to_str().unwrap(),
            r#"Bearer error="invalid_token" error_description="\u{0}\n\ttest\u{2122}: \"\u{108}u oni povas bone \u{15d}an\u{11d}i \u{109}i tiu mesa\u{11d}on en respondon?\"""#,
        );
    }

    #[test]
    fn invalid_token_with_empty_description_doesnt_include_description() {
        assert_eq!(
            invalid_token("").to_str().unwrap(),
            r#"Bearer error="invalid_token""#
        );
    }

    #[test]
    fn insufficient_scope_names_the_missing_permission() {
        let permission = Permission::from_static("delete:drinks");
        let value = insufficient_scope("permission not found", Some(&*permission));

        assert_eq!(
            value.to_str().unwrap(),
            r#"Bearer error="insufficient_scope" error_description="permission not found" scope="delete:drinks""#,
        );
    }

    #[test]
    fn insufficient_scope_without_permission_omits_scope() {
        assert_eq!(
            insufficient_scope("", None).to_str().unwrap(),
            r#"Bearer error="insufficient_scope""#
        );
    }

    #[test]
    fn invalid_request_includes_description() {
        assert_eq!(
            invalid_request("permissions not included in token")
                .to_str()
                .unwrap(),
            r#"Bearer error="invalid_request" error_description="permissions not included in token""#,
        );
    }

    #[tokio::test]
    async fn error_response_has_uniform_body() -> color_eyre::Result<()> {
        let resp = error_response(StatusCode::NOT_FOUND, "Resource is not found");

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
        let body: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "error": 404,
                "message": "Resource is not found",
            })
        );

        Ok(())
    }
}
