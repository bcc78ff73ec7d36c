use rustyline::error::ReadlineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The interface is not listed by `ip link show`.
    #[error("{0} does not exist!")]
    IntfMissing(String),
    /// The interface already carries an IPv4 address.
    #[error("{0} has an IP address, and is probably in use!")]
    IntfInUse(String),
    #[error("no switch with index {index}, topology has {count} switches")]
    NoSuchSwitch { index: usize, count: usize },
    #[error("no node named {0}")]
    NoSuchNode(String),
    #[error("could not spawn `{cmd}`: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: subprocess::PopenError,
    },
    #[error("`{cmd}` failed: {stderr}")]
    CommandFailed { cmd: String, stderr: String },
    #[error("flows did not arrive after {0} attempts")]
    NotReady(u32),
    #[error("readline: {0}")]
    Readline(#[from] ReadlineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
