//! Headless web client
//!
//! Fetches http(s), file, about, data and javascript URLs, turns responses
//! into typed pages and keeps them in windows and frames, the way a browser
//! would, minus the rendering.
//!
//! ```text
//! WebClient ── windows ── WebWindow ── Page (Html | Xml | JavaScript | Text | Unexpected)
//!     │                      └── JobManager (timers)
//!     ├── WebConnection (HttpWebConnection | MockWebConnection)
//!     ├── Cache, DefaultCredentialsProvider
//!     ├── PageCreator, RefreshHandler
//!     └── ScriptEngine (pluggable, none bundled)
//! ```
//!
//! Everything is async on tokio; each call finishes the whole load
//! (frames, scripts, refresh) before it returns.

pub mod cache;
pub mod client;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod events;
pub mod jobs;
pub mod listener;
pub mod options;
pub mod page;
pub mod refresh;
pub mod request;
pub mod response;
pub mod script;
pub mod window;

pub use cache::Cache;
pub use client::WebClient;
pub use connection::{HttpWebConnection, MockWebConnection, WebConnection};
pub use credentials::{AuthScope, Credentials, DefaultCredentialsProvider};
pub use error::{BrowserError, Result, ScriptError};
pub use events::{EventBus, WebWindowEvent};
pub use jobs::{JobId, JobManager};
pub use listener::{ListenerManager, WebWindowListener};
pub use options::{BrowserVersion, WebClientOptions};
pub use page::{
    DefaultPageCreator, FormSubmission, HtmlPage, JavaScriptPage, Page, PageCreator, PageType,
    TextPage, UnexpectedPage, XmlPage,
};
pub use refresh::RefreshHandler;
pub use request::{FormEncoding, HttpMethod, WebRequest};
pub use response::WebResponse;
pub use script::ScriptEngine;
pub use window::{History, WebWindow, WindowId, WindowKind};

pub use hbrowser_dom as dom;
