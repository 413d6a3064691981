//! HTTP message model: URIs, headers, streams, requests, responses.

pub mod headers;
pub mod request;
pub mod response;
pub mod stream;
pub mod uri;

pub use headers::HeaderMap;
pub use request::Request;
pub use response::Response;
pub use stream::{AppendStream, Body, Stream};
pub use uri::Uri;
