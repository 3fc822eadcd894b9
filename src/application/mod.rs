//! Application services that sit between the HTTP surface and the remote store.

pub mod content;
pub mod error;
pub mod repos;
