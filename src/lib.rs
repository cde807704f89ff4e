pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod http;
pub mod logging;
pub mod model;
pub mod services;
pub mod storage;
pub mod types;
pub mod util;

pub use app::App;

pub(crate) mod internal;
