//! Application services for archery practice logging: the live training
//! flow, session history, and app wiring over the storage backends.

#![forbid(unsafe_code)]

pub mod app_services;
pub mod autosave;
pub mod config;
pub mod error;
pub mod history;
pub mod training;

pub use arco_core::Clock;

pub use app_services::AppServices;
pub use autosave::AutosaveWriter;
pub use config::ServicesConfig;
pub use error::{AppServicesError, ConfigLoadError, HistoryError, PersistenceError, TrainingError};
pub use history::{ArrowEdit, HistoryService, SessionEdit};
pub use training::{Applied, RemoteWrite, TrainingService};
