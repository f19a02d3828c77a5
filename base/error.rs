use std::fmt;

/// A crate-wide error: an [`ErrorKind`] plus an optional message and an
/// optional underlying cause, in the spirit of a gRPC status.
#[derive(Debug, thiserror::Error)]
pub struct Error {
    kind: ErrorKind,
    msg: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Error {
            kind,
            msg: Some(msg.into()),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn with_source<E>(kind: ErrorKind, msg: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error {
            kind,
            msg: Some(msg.into()),
            source: Some(Box::new(source)),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            kind,
            msg: None,
            source: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.msg {
            None => fmt::Display::fmt(&self.kind, f),
            Some(m) => write!(f, "{}: {}", self.kind, m),
        }
    }
}

/// Error kind.
///
/// These codes are a reduced form of
/// [grpc::StatusCode](https://github.com/grpc/grpc/blob/0e00c430827e81d61e1e7164ef04ca21ccbfaa77/include/grpcpp/impl/codegen/status_code_enum.h),
/// scoped to the failure modes this crate's graph-shape and scheduler
/// operations can actually produce.
#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
#[non_exhaustive]
#[rustfmt::skip]
pub enum ErrorKind {
    #[error("cancelled")] Cancelled,
    #[error("invalid argument")] InvalidArgument,
    #[error("not connected")] NotConnected,
    #[error("already registered")] AlreadyRegistered,
    #[error("unknown id")] UnknownId,
    #[error("invalid id")] InvalidId,
    #[error("incompatible endpoint")] IncompatibleEndpoint,
    #[error("shutdown")] Shutdown,
    #[error("internal")] Internal,
}

/// Extension methods for `Result`.
pub trait ResultExt<T, E> {
    /// Annotates an error with the given kind and message.
    ///
    /// ```
    /// use streamgraph_base::{ErrorKind, ResultExt};
    /// use std::io::Read;
    /// let mut buf = [0u8; 1];
    /// let r = std::io::Cursor::new("")
    ///     .read_exact(&mut buf[..])
    ///     .err_kind(ErrorKind::Internal, "reading fixture");
    /// assert_eq!(r.unwrap_err().kind(), ErrorKind::Internal);
    /// ```
    fn err_kind(self, k: ErrorKind, msg: impl Into<String>) -> Result<T, Error>;
}

impl<T, E> ResultExt<T, E> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn err_kind(self, k: ErrorKind, msg: impl Into<String>) -> Result<T, Error> {
        self.map_err(|e| Error::with_source(k, msg, e))
    }
}

/// Like `anyhow::bail!`, but the first argument names an [`ErrorKind`].
///
/// ```
/// use streamgraph_base::bail_t;
/// let e = || -> Result<(), streamgraph_base::Error> {
///     bail_t!(UnknownId, "unknown filter {}", 7);
/// }().unwrap_err();
/// assert_eq!(e.kind(), streamgraph_base::ErrorKind::UnknownId);
/// assert_eq!(e.to_string(), "unknown id: unknown filter 7");
/// ```
#[macro_export]
macro_rules! bail_t {
    ($t:ident, $e:expr) => {
        return Err($crate::Error::new($crate::ErrorKind::$t, $e));
    };
    ($t:ident, $fmt:expr, $($arg:tt)+) => {
        return Err($crate::Error::new($crate::ErrorKind::$t, format!($fmt, $($arg)+)));
    };
}

/// Like `anyhow::format_err!`, but the first argument names an [`ErrorKind`].
///
/// ```
/// use streamgraph_base::format_err_t;
/// let e = format_err_t!(UnknownId, "unknown filter {}", 7);
/// assert_eq!(e.kind(), streamgraph_base::ErrorKind::UnknownId);
/// ```
#[macro_export]
macro_rules! format_err_t {
    ($t:ident, $e:expr) => {
        $crate::Error::new($crate::ErrorKind::$t, $e)
    };
    ($t:ident, $fmt:expr, $($arg:tt)+) => {
        $crate::Error::new($crate::ErrorKind::$t, format!($fmt, $($arg)+))
    };
}
