//! HTTP implementation of the backend chat gateway.

mod client;

pub use client::HttpChatGateway;
