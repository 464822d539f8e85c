pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{GeoError, GeoSource, HttpGeoSource, MockGeoSource};
pub use db::{init_db, Repository};
pub use domain::{Decimal, PlatformId, TimeMs, UserId};
pub use error::AppError;
