//! Concrete HTTP transport: a reqwest blocking client and the retry adapter mounted on it.

pub mod client;
pub mod retry;
