//! Client for the external accrual service.

pub mod http;
pub mod wire;

pub use http::HttpAccrualClient;
