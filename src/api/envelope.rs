use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::locale;
use super::status::ResultCode;
use crate::database::Paginated;

/// Uniform response body: `{success, message, status_code, data?, errors?, meta?}`.
///
/// The message is a default that gets replaced by the catalog entry for the
/// translation key (the result code unless overridden) when the request
/// locale has one. `data` and `errors` are omitted when null, `meta` when empty.
#[derive(Debug, Clone)]
pub struct Envelope {
    success: bool,
    message: String,
    http_status: StatusCode,
    code: ResultCode,
    translation_key: Option<String>,
    data: Option<Value>,
    errors: Option<Value>,
    meta: Map<String, Value>,
    headers: HeaderMap,
    serialize_error: Option<String>,
}

impl Envelope {
    pub fn new(success: bool, message: impl Into<String>, http_status: StatusCode, code: ResultCode) -> Self {
        Self {
            success,
            message: message.into(),
            http_status,
            code,
            translation_key: None,
            data: None,
            errors: None,
            meta: Map::new(),
            headers: HeaderMap::new(),
            serialize_error: None,
        }
    }

    pub fn success(message: impl Into<String>, http_status: StatusCode, code: ResultCode) -> Self {
        Self::new(true, message, http_status, code)
    }

    pub fn error(message: impl Into<String>, http_status: StatusCode, code: ResultCode) -> Self {
        Self::new(false, message, http_status, code)
    }

    pub fn ok(data: impl Serialize, message: impl Into<String>) -> Self {
        Self::success(message, StatusCode::OK, ResultCode::Ok).with_data(data)
    }

    pub fn created(data: impl Serialize, message: impl Into<String>) -> Self {
        Self::success(message, StatusCode::CREATED, ResultCode::Created).with_data(data)
    }

    pub fn accepted(data: impl Serialize, message: impl Into<String>) -> Self {
        Self::success(message, StatusCode::ACCEPTED, ResultCode::Accepted).with_data(data)
    }

    pub fn no_content(message: impl Into<String>) -> Self {
        Self::success(message, StatusCode::NO_CONTENT, ResultCode::NoContent)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error(message, StatusCode::BAD_REQUEST, ResultCode::BadRequest)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::error(message, StatusCode::UNAUTHORIZED, ResultCode::Unauthorized)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::error(message, StatusCode::FORBIDDEN, ResultCode::Forbidden)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(message, StatusCode::NOT_FOUND, ResultCode::NotFound)
    }

    pub fn validation_error(message: impl Into<String>, errors: impl Serialize) -> Self {
        Self::error(message, StatusCode::UNPROCESSABLE_ENTITY, ResultCode::ValidationError).with_errors(errors)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::error(message, StatusCode::INTERNAL_SERVER_ERROR, ResultCode::ServerError)
    }

    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = self.capture(data);
        self
    }

    pub fn with_errors(mut self, errors: impl Serialize) -> Self {
        self.errors = self.capture(errors);
        self
    }

    pub fn with_status_code(mut self, code: ResultCode) -> Self {
        self.code = code;
        self
    }

    pub fn with_http_status(mut self, http_status: StatusCode) -> Self {
        self.http_status = http_status;
        self
    }

    pub fn with_translation_key(mut self, key: impl Into<String>) -> Self {
        self.translation_key = Some(key.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Some(value) = self.capture(value) {
            self.meta.insert(key.into(), value);
        }
        self
    }

    /// Merges `meta.pagination` without touching other meta keys.
    pub fn with_pagination<T>(self, page: &Paginated<T>) -> Self {
        self.with_meta(
            "pagination",
            json!({
                "total": page.total,
                "per_page": page.per_page,
                "current_page": page.current_page,
                "last_page": page.last_page,
            }),
        )
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn http_status(&self) -> StatusCode {
        self.http_status
    }

    pub fn status_code(&self) -> ResultCode {
        self.code
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn errors(&self) -> Option<&Value> {
        self.errors.as_ref()
    }

    pub fn translation_key(&self) -> String {
        self.translation_key.clone().unwrap_or_else(|| self.code.translation_key())
    }

    /// Catalog message for the translation key under `locale`, else the default.
    pub fn resolve_message(&self, locale: Option<&str>) -> String {
        let key = self.translation_key();
        locale
            .and_then(|l| locale::catalog().translate(l, &key))
            .filter(|translated| *translated != key)
            .map(str::to_string)
            .unwrap_or_else(|| self.message.clone())
    }

    pub fn to_json(&self, locale: Option<&str>) -> Value {
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(self.success));
        body.insert("message".to_string(), Value::String(self.resolve_message(locale)));
        body.insert("status_code".to_string(), json!(self.code));
        if let Some(data) = &self.data {
            body.insert("data".to_string(), data.clone());
        }
        if let Some(errors) = &self.errors {
            body.insert("errors".to_string(), errors.clone());
        }
        if !self.meta.is_empty() {
            body.insert("meta".to_string(), Value::Object(self.meta.clone()));
        }
        Value::Object(body)
    }

    /// Null payloads are dropped; serialization failures are remembered for the response.
    fn capture(&mut self, value: impl Serialize) -> Option<Value> {
        match serde_json::to_value(value) {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(e) => {
                self.serialize_error = Some(e.to_string());
                None
            }
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        if let Some(err) = &self.serialize_error {
            tracing::error!("Failed to serialize response payload: {}", err);
            return Envelope::server_error("Failed to format response").into_response();
        }

        // 204 must not carry a body
        if self.http_status == StatusCode::NO_CONTENT {
            return (self.http_status, self.headers).into_response();
        }

        let locale = locale::current_locale();
        let body = self.to_json(locale.as_deref());
        (self.http_status, self.headers, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::PageRequest;

    #[test]
    fn ok_omits_errors_and_meta() {
        let body = Envelope::ok(json!({"id": 1}), "Brands retrieved successfully").to_json(None);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Brands retrieved successfully"));
        assert_eq!(body["status_code"], json!(1000));
        assert_eq!(body["data"], json!({"id": 1}));
        assert!(body.get("errors").is_none());
        assert!(body.get("meta").is_none());
    }

    #[test]
    fn null_data_is_omitted() {
        let body = Envelope::ok(Value::Null, "Brand deleted successfully").to_json(None);
        assert!(body.get("data").is_none());
    }

    #[test]
    fn validation_error_carries_field_map() {
        let envelope = Envelope::validation_error("Validation Error", json!({"name": ["required"]}));
        assert_eq!(envelope.http_status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = envelope.to_json(None);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["status_code"], json!(2004));
        assert_eq!(body["errors"]["name"], json!(["required"]));
        assert!(body.get("data").is_none());
    }

    #[test]
    fn convenience_constructors_prefill_status_pairs() {
        let cases = [
            (Envelope::created(json!({}), "c"), StatusCode::CREATED, ResultCode::Created),
            (Envelope::accepted(json!({}), "a"), StatusCode::ACCEPTED, ResultCode::Accepted),
            (Envelope::no_content("n"), StatusCode::NO_CONTENT, ResultCode::NoContent),
            (Envelope::bad_request("b"), StatusCode::BAD_REQUEST, ResultCode::BadRequest),
            (Envelope::unauthorized("u"), StatusCode::UNAUTHORIZED, ResultCode::Unauthorized),
            (Envelope::forbidden("f"), StatusCode::FORBIDDEN, ResultCode::Forbidden),
            (Envelope::not_found("n"), StatusCode::NOT_FOUND, ResultCode::NotFound),
            (Envelope::server_error("s"), StatusCode::INTERNAL_SERVER_ERROR, ResultCode::ServerError),
        ];
        for (envelope, http, code) in cases {
            assert_eq!(envelope.http_status(), http);
            assert_eq!(envelope.status_code(), code);
        }
    }

    #[test]
    fn pagination_merges_into_existing_meta() {
        let page = Paginated::new(vec![1, 2, 3], 23, PageRequest::new(2, 10));
        let body = Envelope::ok(json!({"brands": page.items}), "ok")
            .with_meta("filters", json!({"featured": true}))
            .with_pagination(&page)
            .to_json(None);
        assert_eq!(body["meta"]["filters"], json!({"featured": true}));
        assert_eq!(
            body["meta"]["pagination"],
            json!({"total": 23, "per_page": 10, "current_page": 2, "last_page": 3})
        );
    }

    #[test]
    fn message_is_translated_when_catalog_has_the_key() {
        let envelope = Envelope::success("Login successful", StatusCode::OK, ResultCode::LoginSuccess);
        assert_eq!(envelope.resolve_message(Some("id")), "Login berhasil");
        assert_eq!(envelope.resolve_message(Some("de")), "Login successful");
        assert_eq!(envelope.resolve_message(None), "Login successful");
    }

    #[test]
    fn translation_key_can_be_overridden() {
        let envelope = Envelope::ok(Value::Null, "Custom")
            .with_status_code(ResultCode::GetUserSuccessfully)
            .with_translation_key("no-such-key");
        assert_eq!(envelope.resolve_message(Some("id")), "Custom");
        assert_eq!(envelope.to_json(None)["status_code"], json!(3002));
    }
}
