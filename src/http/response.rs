// src/http/response.rs

use super::request::Headers;

/// What a handler may do to the outbound response.
pub trait Response: Send {
    fn set_status(&mut self, status: u16);
    fn set_content_type(&mut self, content_type: &str);
    fn set_charset(&mut self, charset: &str);
    fn add_header(&mut self, name: &str, value: &str);
    fn write_bytes(&mut self, bytes: &[u8]);

    fn write_text(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    /// Structured error writer: replaces status and body with an error
    /// status/message pair.
    fn send_error(&mut self, status: u16, message: &str);
}

/// In-memory response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub charset: Option<String>,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// Message passed to [`Response::send_error`], if it was called.
    pub error: Option<String>,
}

impl Default for BufferedResponse {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: None,
            charset: None,
            headers: Headers::new(),
            body: Vec::new(),
            error: None,
        }
    }
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Response for BufferedResponse {
    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn set_content_type(&mut self, content_type: &str) {
        match content_type.split_once(';') {
            Some((ct, params)) => {
                self.content_type = Some(ct.trim().to_string());
                if let Some((_, cs)) = params.trim().split_once('=') {
                    self.charset = Some(cs.trim().to_string());
                }
            }
            None => self.content_type = Some(content_type.trim().to_string()),
        }
    }

    fn set_charset(&mut self, charset: &str) {
        self.charset = Some(charset.to_string());
    }

    fn add_header(&mut self, name: &str, value: &str) {
        self.headers.append(name, value);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    fn send_error(&mut self, status: u16, message: &str) {
        self.status = status;
        self.content_type = Some("text/plain".to_string());
        self.charset = Some("utf-8".to_string());
        self.body = message.as_bytes().to_vec();
        self.error = Some(message.to_string());
    }
}
