//! `multipart/form-data` bodies in the exact layout the solving services
//! were integrated against.
//!
//! The boundary token is 12 lowercase hex characters. The `Content-Type`
//! header announces it prefixed by 28 dashes, so every delimiter line in the
//! body carries 30.

use rand::Rng;

const BOUNDARY_PREFIX: &str = "----------------------------";

#[derive(Debug, Clone)]
enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// Ordered list of form fields plus the boundary that separates them.
#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push(Part::Text {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Adds the CAPTCHA image as `vercode.jpeg`, the name every service accepts.
    pub fn image(self, name: &str, bytes: &[u8]) -> Self {
        self.file(name, "vercode.jpeg", "image/jpeg", bytes)
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.parts.push(Part::File {
            name: name.to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            bytes: bytes.to_vec(),
        });
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={BOUNDARY_PREFIX}{}", self.boundary)
    }

    pub fn into_body(self) -> Vec<u8> {
        let delimiter = format!("--{BOUNDARY_PREFIX}{}", self.boundary);
        let mut body = Vec::new();

        for part in self.parts {
            body.extend_from_slice(delimiter.as_bytes());
            body.extend_from_slice(b"\r\n");
            match part {
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    filename,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                             Content-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(delimiter.as_bytes());
        body.extend_from_slice(b"--\r\n");
        body
    }
}

/// Unlikely-to-collide boundary; not meant to be unpredictable.
pub fn generate_boundary() -> String {
    let mut rng = rand::rng();
    format!(
        "{:06x}{:06x}",
        rng.random_range(0..0x100_0000u32),
        rng.random_range(0..0x100_0000u32)
    )
}
