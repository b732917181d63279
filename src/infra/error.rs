use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("cannot read `{path}`: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl InfraError {
    /// A document named on the command line could not be read.
    pub fn input(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Input {
            path: path.into(),
            source,
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
