//! Data Transfer Objects for REST request/response serialization.
//!
//! Handlers exchange rows as JSON objects ([`crate::model::Record`]); the
//! types here describe those objects in the OpenAPI document.

pub mod puppy_dto;

pub use puppy_dto::*;
