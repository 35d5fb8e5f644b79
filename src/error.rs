use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Codec(std::io::Error),
    Corrupted(&'static str),
    InvalidMagic(&'static str),
    FrameIndexTooLarge,
    NoSeekTable,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Codec(err) => write!(f, "codec error: {err}"),
            Error::Corrupted(msg) => write!(f, "corrupted seek table: {msg}"),
            Error::InvalidMagic(msg) => write!(f, "invalid magic number: {msg}"),
            Error::FrameIndexTooLarge => write!(f, "frame index too large"),
            Error::NoSeekTable => write!(f, "no seek table found"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) | Error::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(err) | Error::Codec(err) => err,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
