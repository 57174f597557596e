use libc::c_int;
use thiserror::Error;

/// Errors returned by filesystem operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("File exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Operation not permitted: {0}")]
    PermissionDenied(String),

    #[error("The root directory cannot be removed")]
    RootBusy,

    #[error("File too large: {0}")]
    FileTooLarge(String),

    #[error("No space left to grow: {0}")]
    NoSpace(String),

    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    /// Rotation needs at least two path components
    #[error("Path cannot be rotated: {0}")]
    NotApplicable(String),
}

impl FsError {
    /// Positive errno for this error. Dispatchers negate it or hand it
    /// to a reply as-is, depending on their convention.
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::AlreadyExists(_) => libc::EEXIST,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::IsADirectory(_) => libc::EISDIR,
            FsError::PermissionDenied(_) => libc::EPERM,
            FsError::RootBusy => libc::EBUSY,
            FsError::FileTooLarge(_) => libc::EFBIG,
            FsError::NoSpace(_) => libc::ENOSPC,
            FsError::InvalidPath(_) | FsError::NotApplicable(_) => libc::EINVAL,
        }
    }

    /// Signed return code in the `-errno` convention
    pub fn code(&self) -> c_int {
        -self.errno()
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
