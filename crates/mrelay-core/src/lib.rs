pub mod config;
pub mod logging;

pub mod error;
pub mod filename;
pub mod gate;
pub mod history;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod resolver;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod transfer;
pub mod transport;
