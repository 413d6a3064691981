//! # easyreq
//!
//! A lightweight HTTP client library with a fluent request builder,
//! pluggable transports, and cookie jar management.
//!
//! `easyreq` compiles a mutable option set into one immutable, wire-ready
//! request, dispatches it through a swappable transport, and drives cookie
//! propagation and redirect-following across the resulting chain of
//! request/response pairs.
//!
//! ## Features
//!
//! - **Fluent builder**: query, form, JSON, and multipart bodies with
//!   validated options
//! - **Two transports**: a hyper-backed handler and a raw-socket handler,
//!   resolved automatically or by name
//! - **Proxies**: HTTP (absolute-URI and CONNECT), SOCKS4/4A, and SOCKS5
//!   with username/password authentication
//! - **Cookies**: RFC 6265 style jar with domain/path scoping and optional
//!   file persistence
//! - **Redirects**: unlimited or capped following, with full
//!   request/response history kept for inspection
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use easyreq::client::Client;
//! use easyreq::client::options::FollowRedirects;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut client = Client::get("https://example.com/")
//!         .unwrap()
//!         .with_follow_redirects(FollowRedirects::Max(5));
//!     if let Ok(Some(response)) = client.send().await {
//!         println!("Status: {}", response.status());
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions
//! - [`client`] - The request engine, options, and send loop
//! - [`cookies`] - Cookie model, jar, and file persistence
//! - [`handler`] - Transports, proxies, and handler resolution
//! - [`message`] - Immutable request/response/URI/stream types
//!
//! Errors raised inside the send loop never propagate out of `send()`;
//! they are stored on the client and the partial redirect history stays
//! inspectable.

pub mod base;
pub mod client;
pub mod cookies;
pub mod handler;
pub mod message;
pub mod mime;

pub use base::ClientError;
pub use client::{Client, Timing};
pub use cookies::{Cookie, CookieJar, FileCookieJar, JarHandle};
pub use handler::{Handler, HandlerChoice};
pub use message::{Body, HeaderMap, Request, Response, Stream, Uri};
