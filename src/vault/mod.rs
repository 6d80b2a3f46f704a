pub mod container;
pub mod handle;
pub mod models;
pub mod payload;
pub mod secret_serde;
pub mod service;
pub mod store;
