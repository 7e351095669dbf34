//! Reply envelope understood by the SMS gateway

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// An XML `<Response><Message>` reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwiMl {
    status: StatusCode,
    body: String,
}

impl TwiMl {
    pub fn message(text: &str) -> Self {
        Self::with_status(StatusCode::OK, text)
    }

    pub fn with_status(status: StatusCode, text: &str) -> Self {
        Self {
            status,
            body: format!(
                "<Response><Message>{}</Message></Response>",
                escape_xml(text)
            ),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl IntoResponse for TwiMl {
    fn into_response(self) -> Response {
        (self.status, [(header::CONTENT_TYPE, "text/xml")], self.body).into_response()
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
