//! Data Transfer Objects for REST request/response serialization.
//!
//! All wei amounts are serialized as JSON strings to prevent precision
//! loss on u128 values, alongside an ether rendering.

pub mod arisan_dto;
pub mod common_dto;
pub mod randomness_dto;

pub use arisan_dto::*;
pub use common_dto::*;
pub use randomness_dto::*;
