mod outcome;
mod service;

pub use outcome::{Applied, RemoteWrite};
pub use service::TrainingService;
