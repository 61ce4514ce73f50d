use thiserror::Error;

pub type PackResult<T> = Result<T, PackError>;

#[derive(Error, Debug)]
pub enum PackError {
    /// The operation is not allowed in the writer's current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A payload source yielded fewer bytes than its declared length.
    #[error("File read error: {0}")]
    FileRead(String),

    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// The XML writer API was called out of sequence.
    #[error("XML error: {0}")]
    XmlError(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WalkDir error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

/// Fieldless view of [`PackError`] for matching on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidState,
    InvalidParameter,
    FileRead,
    SignatureInvalid,
    XmlError,
    NotImplemented,
    Io,
}

impl PackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PackError::InvalidState(_) => ErrorKind::InvalidState,
            PackError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            PackError::FileRead(_) => ErrorKind::FileRead,
            PackError::SignatureInvalid(_) => ErrorKind::SignatureInvalid,
            PackError::XmlError(_) => ErrorKind::XmlError,
            PackError::NotImplemented(_) => ErrorKind::NotImplemented,
            PackError::Io(_) | PackError::WalkDir(_) => ErrorKind::Io,
        }
    }
}
