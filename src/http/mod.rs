pub mod client;
pub mod error;
pub mod multipart;

pub use client::{HttpClient, HttpResponse};
pub use error::TransportError;
pub use multipart::Multipart;
