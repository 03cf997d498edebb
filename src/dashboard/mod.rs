//! The web dashboard: server-rendered agent pages plus a small JSON proxy.

mod api;
mod pages;
pub mod routes;
mod server;
pub mod views;

pub use api::HealthResponse;
pub use server::*;
