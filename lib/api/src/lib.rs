//! HTTP surface for songvec: query embedding and model management.

pub mod rest;

pub use rest::RestApi;
