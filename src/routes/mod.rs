//! Plug-and-play consent routes for Axum.
//!
//! This module mounts the vault side of the authorization flow as an
//! Axum router: session creation, credential submission, the consent
//! prompt, selection toggles, and the final decision redirect back to
//! the relying party. The in-flight session is bound to the browser
//! with a private (encrypted) cookie.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use consent_vault::routes::{VaultConfig, consent_routes};
//! use consent_vault::{AuthorizationFlow, FieldCatalog, ReasonResolver};
//!
//! // 1. Implement Authenticator and AuditSink for your collaborators
//! // 2. Configure from environment
//! let config = VaultConfig::from_env()?;
//!
//! // 3. Compose the flow and mount the routes
//! let flow = AuthorizationFlow::new(
//!     FieldCatalog::standard(),
//!     ReasonResolver::standard(),
//!     authenticator,
//!     audit_sink,
//! );
//! let app = axum::Router::new().merge(consent_routes(config, flow));
//! ```

mod config;
mod cookies;
mod error;
mod routes;
mod state;

pub use config::VaultConfig;
pub use error::RoutesError;
pub use routes::consent_routes;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
