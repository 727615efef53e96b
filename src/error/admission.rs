use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Failed to resolve current process id: {message}")]
    CurrentPid { message: &'static str },
    #[error("Process {pid} not visible to the resource sampler.")]
    ProcessNotFound { pid: u32 },
    #[error("Failed to read active connections for '{host}': {message}")]
    ConnectionLookup { host: String, message: String },
}
