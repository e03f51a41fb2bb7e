use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open blob storage")]
    Storage,
    #[display("could not open catalog")]
    Catalog,
    /// The engine turned the request down (bad path, over quota, not yours).
    #[display("request rejected")]
    Rejected,
    #[display("operation failed")]
    Engine,
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] String),
    #[display("could not access {_0}")]
    Local(#[error(not(source))] String),
    #[display("could not write output")]
    Output,
}

impl ErrorKind {
    /// Wrap an engine error, telling requests that were refused apart from
    /// operations that broke.
    #[track_caller]
    pub fn engine(err: hoard_engine::error::Error) -> Error {
        let kind = match err.is_client_error() {
            true => ErrorKind::Rejected,
            false => ErrorKind::Engine,
        };
        err.raise(kind)
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Rejected | Self::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}
