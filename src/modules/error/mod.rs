use code::ErrorCode;
use snafu::{Location, Snafu};

pub mod code;
pub mod handler;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(display("{message}"))]
    Generic {
        message: String,
        #[snafu(implicit)]
        location: Location,
        code: ErrorCode,
    },
}

pub type AppResult<T, E = AppError> = std::result::Result<T, E>;

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Generic { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Generic { message, .. } => message,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        raise_error!(format!("storage error: {e}"), ErrorCode::InternalError)
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        raise_error!(
            format!("timed out acquiring a per-user storage connection: {e}"),
            ErrorCode::ConnectionPoolTimeout
        )
    }
}

/// Build an [`AppError::Generic`] with file/line context, mirroring the
/// single-variant error style used across the storage and cleanup layers.
#[macro_export]
macro_rules! raise_error {
    ($message:expr, $code:expr) => {
        $crate::modules::error::AppError::Generic {
            message: $message,
            location: snafu::Location::new(file!(), line!(), column!()),
            code: $code,
        }
    };
}
