//! Client for the remote LLM gateway.

pub mod client;

pub use client::HttpGateway;
