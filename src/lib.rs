//! riic - rotates the instance identity certificate chain
//!
//! Diego cells authenticate to the router tier and CredHub with an instance
//! identity certificate issued by a per-deployment intermediate CA, which is in
//! turn signed by a fleet-wide root CA. This crate rotates that chain across
//! every deployment with Diego cells (the platform itself, isolation segments
//! and Windows segments).
//!
//! # Rotation
//!
//! Rotation is a resumable sequence of phases:
//! - `bosh` - add temporary regen certificate variables to each manifest and deploy directly through BOSH
//! - `credhub` - promote the generated certificates over the live CredHub paths
//! - `apply` - apply changes through Ops Manager, which drops the temporary variables
//! - `cleanup` - delete the temporary regen certificates from CredHub
//!
//! # Modules
//!
//! - [`manifest`] - Manifest model, deployment topologies and the deployment collector
//! - [`bosh`] - BOSH CLI integration (deployments, instances, deploys, file retrieval)
//! - [`credhub`] - CredHub CLI integration (certificate get/import/delete)
//! - [`opsman`] - Ops Manager HTTP API client
//! - [`validate`] - Live certificate verifiers and expiration checks
//! - [`rotate`] - The rotation phase machine
//! - [`retry`] - Backoff for transiently failing calls
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod bosh;
pub mod credhub;
pub mod error;
pub mod manifest;
pub mod opsman;
pub mod retry;
pub mod rotate;
pub mod validate;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
