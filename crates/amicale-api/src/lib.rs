//! # amicale-api
//!
//! Client side of the persistence-API contract.  [`PersistenceApi`] is the
//! trait the messaging core is generic over; [`HttpApi`] is its production
//! implementation speaking JSON over HTTP to the persistence service.

pub mod api;
pub mod client;
pub mod error;

pub use api::PersistenceApi;
pub use client::HttpApi;
pub use error::{ApiError, Result};
