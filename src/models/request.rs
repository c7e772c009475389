//! Request definition: the single HTTP call every virtual user repeats

use crate::{
    client::PreparedRequest,
    error::{AppError, Result},
    types::{BodyFormat, HttpMethod},
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Request body with exactly one serialization per variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RequestBody {
    /// Sent as-is
    Raw(Vec<u8>),
    /// Serialized with `serde_json`
    Json(serde_json::Value),
    /// Serialized as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Load a body file, interpreting it according to `format`
    pub fn from_file(path: &Path, format: BodyFormat) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| AppError::io(format!("Failed to read body file '{}': {}", path.display(), e)))?;

        let format = match format {
            BodyFormat::Auto => {
                let is_json = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                if is_json { BodyFormat::Json } else { BodyFormat::Raw }
            }
            other => other,
        };

        Self::from_bytes(bytes, format)
            .map_err(|e| match e {
                AppError::Encoding(msg) => AppError::encoding(format!("{}: {}", path.display(), msg)),
                other => other,
            })
    }

    /// Interpret raw bytes as a body. `Auto` is treated as raw.
    pub fn from_bytes(bytes: Vec<u8>, format: BodyFormat) -> Result<Self> {
        match format {
            BodyFormat::Auto | BodyFormat::Raw => Ok(Self::Raw(bytes)),
            BodyFormat::Json => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| AppError::encoding(format!("invalid JSON body: {}", e)))?;
                Ok(Self::Json(value))
            }
            BodyFormat::Form => {
                let value: serde_json::Value = serde_json::from_slice(&bytes)
                    .map_err(|e| AppError::encoding(format!("form body must be a JSON object: {}", e)))?;
                Self::form_from_json(&value)
            }
        }
    }

    /// Flatten a JSON object of scalars into form fields
    pub fn form_from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| AppError::encoding("form body must be a JSON object"))?;

        let mut fields = Vec::with_capacity(object.len());
        for (key, value) in object {
            let field = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => String::new(),
                _ => {
                    return Err(AppError::encoding(format!(
                        "form field '{}' must be a string, number or boolean",
                        key
                    )))
                }
            };
            fields.push((key.clone(), field));
        }
        Ok(Self::Form(fields))
    }

    /// Content type implied by the body variant
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Raw(_) => None,
            Self::Json(_) => Some("application/json"),
            Self::Form(_) => Some("application/x-www-form-urlencoded"),
        }
    }

    /// Serialize the body to the bytes sent on the wire
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Raw(bytes) => Ok(bytes.clone()),
            Self::Json(value) => serde_json::to_vec(value)
                .map_err(|e| AppError::encoding(format!("failed to serialize JSON body: {}", e))),
            Self::Form(fields) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                Ok(encoded.into_bytes())
            }
        }
    }
}

/// Immutable description of one HTTP call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    method: HttpMethod,
    url: String,
    headers: BTreeMap<String, String>,
    body: Option<RequestBody>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.headers.insert(name.into(), value.into());
        }
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Build the transport-ready request: parse the URL, serialize the body
    /// and merge headers. Explicit headers win over the body's content type.
    pub fn prepare(&self) -> Result<PreparedRequest> {
        let url = reqwest::Url::parse(&self.url)
            .map_err(|e| AppError::config(format!("Invalid target URL '{}': {}", self.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::config(format!(
                "Target URL must use http or https: {}",
                self.url
            )));
        }

        let body = self.body.as_ref().map(RequestBody::encode).transpose()?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(crate::USER_AGENT));
        if let Some(content_type) = self.body.as_ref().and_then(RequestBody::content_type) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }

        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|e| AppError::config(format!("Invalid header name '{}': {}", name, e)))?;
            let header_value = HeaderValue::from_str(value.trim())
                .map_err(|e| AppError::config(format!("Invalid value for header '{}': {}", name, e)))?;
            headers.insert(header_name, header_value);
        }

        Ok(PreparedRequest {
            method: self.method.into(),
            url,
            headers,
            body,
        })
    }
}

/// Parse a `Name: value` header argument
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| AppError::config(format!("Header must look like 'Name: value', got '{}'", raw)))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::config(format!("Header name cannot be empty: '{}'", raw)));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_prepare_get_request() {
        let prepared = RequestSpec::get("http://localhost:3000/users?data-source=gatewayB")
            .prepare()
            .unwrap();

        assert_eq!(prepared.method, reqwest::Method::GET);
        assert_eq!(prepared.url.query(), Some("data-source=gatewayB"));
        assert!(prepared.body.is_none());
        assert!(prepared.headers.get(CONTENT_TYPE).is_none());
        assert_eq!(prepared.headers.get(USER_AGENT).unwrap(), crate::USER_AGENT);
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let body = RequestBody::Json(serde_json::json!({"username": "teste", "password": "123"}));
        let prepared = RequestSpec::post("http://localhost:3000/users/create")
            .with_body(body)
            .prepare()
            .unwrap();

        assert_eq!(prepared.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        let sent: serde_json::Value = serde_json::from_slice(prepared.body.as_ref().unwrap()).unwrap();
        assert_eq!(sent["username"], "teste");
    }

    #[test]
    fn test_explicit_header_overrides_body_content_type() {
        let prepared = RequestSpec::post("http://localhost/users")
            .with_body(RequestBody::Json(serde_json::json!([1, 2])))
            .with_header("Content-Type", "application/vnd.api+json")
            .with_header("X-Trace", "abc")
            .prepare()
            .unwrap();

        assert_eq!(prepared.headers.get(CONTENT_TYPE).unwrap(), "application/vnd.api+json");
        assert_eq!(prepared.headers.get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn test_form_body_encoding() {
        let body = RequestBody::Form(vec![
            ("username".to_string(), "te ste".to_string()),
            ("device".to_string(), "a&b".to_string()),
        ]);
        assert_eq!(body.encode().unwrap(), b"username=te+ste&device=a%26b".to_vec());
        assert_eq!(body.content_type(), Some("application/x-www-form-urlencoded"));
    }

    #[test]
    fn test_form_rejects_nested_values() {
        let value = serde_json::json!({"devices": {"name": "phone"}});
        let err = RequestBody::form_from_json(&value).unwrap_err();
        assert!(matches!(err, AppError::Encoding(_)));

        let value = serde_json::json!({"age": 3, "admin": false, "name": "x"});
        let body = RequestBody::form_from_json(&value).unwrap();
        assert!(matches!(body, RequestBody::Form(ref fields) if fields.len() == 3));
    }

    #[test]
    fn test_invalid_json_file_is_encoding_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{\"username\": ").unwrap();

        let err = RequestBody::from_file(file.path(), BodyFormat::Auto).unwrap_err();
        assert!(matches!(err, AppError::Encoding(_)), "got {:?}", err);
    }

    #[test]
    fn test_auto_format_detection() {
        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json_file, "{{\"a\": 1}}").unwrap();
        assert!(matches!(
            RequestBody::from_file(json_file.path(), BodyFormat::Auto).unwrap(),
            RequestBody::Json(_)
        ));

        let mut text_file = NamedTempFile::new().unwrap();
        write!(text_file, "plain payload").unwrap();
        assert_eq!(
            RequestBody::from_file(text_file.path(), BodyFormat::Auto).unwrap(),
            RequestBody::Raw(b"plain payload".to_vec())
        );
    }

    #[test]
    fn test_missing_body_file_is_io_error() {
        let err = RequestBody::from_file(Path::new("/nonexistent/body.json"), BodyFormat::Json).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn test_invalid_url_and_headers() {
        assert!(matches!(RequestSpec::get("not a url").prepare(), Err(AppError::Config(_))));
        assert!(matches!(RequestSpec::get("ftp://example.com").prepare(), Err(AppError::Config(_))));

        let bad_header = RequestSpec::get("http://localhost").with_header("Bad Header", "x");
        assert!(matches!(bad_header.prepare(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Authorization: Bearer abc:def").unwrap(),
            ("Authorization".to_string(), "Bearer abc:def".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }
}
