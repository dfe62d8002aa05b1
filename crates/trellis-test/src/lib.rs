//! Test utilities for Trellis pipelines.
//!
//! This crate runs a built [`Pipeline`](trellis_middleware::Pipeline) in
//! memory, through the same transport adapter a host uses, and provides
//! assertion helpers for the response envelopes.
//!
//! # Example
//!
//! ```ignore
//! use trellis_test::{TestClient, TestRequest};
//!
//! let client = TestClient::new(login_pipeline(&services));
//! let response = client
//!     .send(
//!         TestRequest::post("/login")
//!             .basic("client", "secret")
//!             .json(&json!({ "email": "a@b.com", "password": "x", "channel": "web" })),
//!     )
//!     .await;
//!
//! response.assert_status(StatusCode::OK);
//! let data = response.assert_success_envelope();
//! assert!(data["token"].is_string());
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::TestClient;
pub use error::TestError;
pub use request::TestRequest;
pub use response::TestResponse;
