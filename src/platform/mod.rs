//! Legion platform clients.
//!
//! `oauth` handles the authorization-code flow against the platform's OAuth
//! server; `entities` wraps the entity/feed REST API that weather stations
//! and readings are written through.

pub mod entities;
pub mod oauth;

pub use entities::LegionApi;
pub use oauth::{LegionOAuth, TokenSet};
