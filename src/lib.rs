
pub mod config;
pub mod fim;
pub mod hash;
pub mod store;
