//! HTTP surface: notification and health endpoints, the event stream,
//! middleware and the OpenAPI document.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
mod doc;
