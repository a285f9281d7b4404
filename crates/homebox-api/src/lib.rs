// homebox-api: Async Rust client for the Homebox inventory REST API
//
// Token authentication with single-flight refresh, paginated item and
// location reads, notifier registration, and a retry policy that tells
// transient failures from permanent ones.

pub mod auth;
pub mod client;
pub mod error;
pub mod items;
pub mod locations;
pub mod models;
pub mod notifiers;
pub mod retry;
pub mod transport;

pub use auth::{AuthClient, AuthConfig, AuthState, Credential, LoginCredentials};
pub use client::HomeboxClient;
pub use error::Error;
pub use models::{EntityRef, ItemResponse, ListPage, LocationResponse, NotifierResponse};
pub use notifiers::DEFAULT_WEBHOOK_EVENTS;
pub use retry::RetryPolicy;
pub use transport::{TlsMode, TransportConfig};
