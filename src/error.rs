use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Everything here ends the process.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not start the async runtime")]
    Runtime,
    #[display("could not open {_0} directory")]
    Storage(#[error(not(source))] &'static str),
    #[display("could not watch the intake directory")]
    Watch,
    #[display("sweep aborted")]
    Sweep,
}
