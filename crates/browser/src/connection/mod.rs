//! Web connections - how requests reach the network
//!
//! The client only knows the `WebConnection` trait. Pooling, redirects and
//! cookie jars belong to the HTTP library behind `HttpWebConnection`; tests
//! swap in `MockWebConnection`.

pub mod http;
pub mod mock;

use async_trait::async_trait;

use crate::error::Result;
use crate::request::WebRequest;
use crate::response::WebResponse;

pub use http::HttpWebConnection;
pub use mock::MockWebConnection;

#[async_trait]
pub trait WebConnection: Send + Sync {
    /// Submit a request and wait for the complete response
    async fn get_response(&self, request: &WebRequest) -> Result<WebResponse>;

    /// Release resources; called once when the client shuts down
    async fn close(&self) {}
}
