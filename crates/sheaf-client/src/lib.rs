//! Sheaf client - catalog service HTTP access and credential profiles.
//!
//! This crate provides the concrete implementations behind the traits in
//! `sheaf_core::traits`: a [`MarketplaceClient`] speaking the catalog
//! service's wire protocol, the factory that binds one to each partition,
//! and a file-based [`ProfileStore`] for credential resolution.

pub mod credentials;
pub mod marketplace;

pub use credentials::ProfileStore;
pub use marketplace::{CatalogEntry, MarketplaceClient, MarketplaceClientFactory};
