//! Backend access for the claims workflow.
//!
//! `gateway` holds the traits the dispatchers are written against,
//! `client` the reqwest implementation, and `endpoints` the path table.

pub mod client;
pub mod endpoints;
pub mod gateway;

pub use client::HttpGateway;
pub use gateway::{ClaimsGateway, RoomsGateway};
