// Common types and utilities shared across the application

pub mod access;
pub mod ids;
pub mod masking;

pub use access::{AccessError, AccessPolicy};
pub use ids::UserId;
pub use masking::{mask_phone, mask_secret};
