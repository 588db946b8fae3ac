//! Data Transfer Objects for REST request/response serialization.
//!
//! Credit amounts are serialized as decimal strings (`"1.50"`) and
//! accepted as strings or numbers.

pub mod common_dto;
pub mod message_dto;
pub mod profile_dto;
pub mod request_dto;
pub mod review_dto;
pub mod session_dto;

pub use common_dto::*;
pub use message_dto::*;
pub use profile_dto::*;
pub use request_dto::*;
pub use review_dto::*;
pub use session_dto::*;
