/// Core error type for the agent.
///
/// Adapter crates map their specific errors into this type so the dispatch
/// logic can handle failures consistently (user-facing relay vs log-and-drop).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("probe error: {0}")]
    Probe(String),

    #[error("power command failed: {0}")]
    Power(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
