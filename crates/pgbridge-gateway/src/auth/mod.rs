//! Authentication Subsystem for pgbridge
//!
//! One authentication method and one identity provider are fixed for the
//! process:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    AuthGateway                       │
//! │  ┌──────────────────┐        ┌────────────────────┐  │
//! │  │ Method           │  ───►  │ IdentityProvider   │  │
//! │  │ - NoPassword     │        │ - Anonymous        │  │
//! │  │ - Password       │        │ - TicketBased      │  │
//! │  │ - DelegatedTicket│        │                    │  │
//! │  └──────────────────┘        └────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Delegated tickets are validated by a pluggable `TicketAcceptor`.
//!
//! # Usage
//!
//! ```ignore
//! let config = AuthConfig::from_env(AuthMethodKind::Password, IdentityKind::Anonymous);
//! let gateway = AuthGateway::new(config)?;
//!
//! if gateway.verify_password(user, password) {
//!     let identity = gateway.identify(Credential::Password { user }).await.into_result()?;
//! }
//! ```

pub mod config;
pub mod gateway;
pub mod identity;
pub mod providers;
pub mod ticket;

// Re-exports for convenient access
pub use config::{AuthConfig, AuthMethodKind, IdentityKind};
pub use gateway::AuthGateway;
pub use identity::AuthResult;
pub use providers::{AnonymousProvider, IdentityProvider, TicketIdentityProvider};
pub use ticket::{AcceptedTicket, StaticTicketAcceptor, TicketAcceptor};
