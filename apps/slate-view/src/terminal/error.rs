use crate::client::inject::InjectError;
use crate::client::prefill::PrefillError;
use sniffer_sdk::SnifferError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Sniffer(#[from] SnifferError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unknown service '{0}'")]
    UnknownService(String),
    #[error("invalid prefill: {0}")]
    Prefill(#[from] PrefillError),
    #[error("{0}")]
    Inject(#[from] InjectError),
    #[error("terminal runtime error: {0}")]
    Runtime(String),
    #[error("logging initialization failed: {0}")]
    Logging(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
