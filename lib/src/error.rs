use std::{fmt, io};
use std::panic::Location;
use std::error::Error as StdError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A chain of error details, innermost cause last.
///
/// Anything implementing [`ErrorDetail`] converts into an `Error` via `?`,
/// recording the caller's location. Use [`Chainable::chain()`] to wrap a
/// lower-level failure in a higher-level explanation.
#[derive(Debug)]
pub struct Error {
    detail: Box<dyn ErrorDetail>,
    cause: Option<Box<Error>>,
    location: &'static Location<'static>,
}

pub trait ErrorDetail: fmt::Display + fmt::Debug + Send + Sync {
    /// Key/value pairs displayed beneath the message.
    fn context(&self) -> Vec<(Option<String>, String)> { vec![] }
}

impl Error {
    #[track_caller]
    pub fn from_std<E>(error: E) -> Self
        where E: StdError + Send + Sync + 'static
    {
        Error::from(Box::new(error) as Box<dyn StdError + Send + Sync>)
    }

    /// The outermost message of this error.
    pub fn message(&self) -> String {
        self.detail.to_string()
    }

    /// Iterates over the chain from outermost to innermost.
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |e| e.cause.as_deref())
    }

    /// Makes `self` the innermost cause of `outer`.
    pub fn chain(self, mut outer: Error) -> Self {
        fn attach(error: Error, to: &mut Error) {
            match to.cause.as_mut() {
                Some(cause) => attach(error, cause),
                None => to.cause = Some(Box::new(error)),
            }
        }

        attach(self, &mut outer);
        outer
    }
}

impl ErrorDetail for Box<dyn StdError + Send + Sync> {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let mut ctxt = vec![];
        let mut error = self.source();
        while let Some(e) = error {
            ctxt.push((None, e.to_string()));
            error = e.source();
        }

        ctxt
    }
}

macro_rules! impl_error_detail_with_std_error {
    ($($T:ty),* $(,)?) => {
        $(
            impl $crate::error::ErrorDetail for $T {
                fn context(&self) -> Vec<(Option<String>, String)> {
                    std::iter::successors(StdError::source(self), |e| (*e).source())
                        .map(|e| (None, e.to_string()))
                        .collect()
                }
            }
        )*
    }
}

impl_error_detail_with_std_error!(
    io::Error,
    toml::de::Error,
    serde_json::Error,
    globset::Error,
    std::path::StripPrefixError,
);

impl ErrorDetail for String { }
impl ErrorDetail for &'static str { }

impl<T: ErrorDetail + 'static> From<T> for Error {
    #[track_caller]
    fn from(detail: T) -> Self {
        Error {
            detail: Box::new(detail),
            cause: None,
            location: Location::caller(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backtrace = std::env::var_os("RUST_BACKTRACE").is_some();
        for (depth, error) in self.iter().enumerate() {
            let indent = " ".repeat(depth * 4);
            let newline = format!("\n{indent}");
            writeln!(f, "{indent}{}", error.detail.to_string().replace('\n', &newline))?;
            for (key, value) in error.detail.context() {
                let value = value.replace('\n', &newline);
                match key {
                    Some(key) => writeln!(f, "{indent}{key}: {value}")?,
                    None => writeln!(f, "{indent}{value}")?,
                }
            }

            if backtrace {
                writeln!(f, "{indent}[{}]", error.location)?;
            }
        }

        Ok(())
    }
}

/// An ad-hoc error built by the [`error!`](crate::error!) macro.
#[derive(Debug)]
pub struct Message {
    pub message: String,
    pub parameters: Vec<(Option<String>, String)>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.message, f)
    }
}

impl ErrorDetail for Message {
    fn context(&self) -> Vec<(Option<String>, String)> {
        self.parameters.clone()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! err {
    ($($token:tt)*) => (Err($crate::error!($($token)*)));
}

/// Builds an [`Error`] from a message and optional `key => value` context.
///
/// ```rust
/// let e = marksmith::error!("unknown preset", "preset" => "fancy");
/// assert_eq!(e.message(), "unknown preset");
/// assert!(e.to_string().contains("preset: fancy"));
/// ```
#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($msg:expr $(, $($rest:tt)*)?) => (
        $crate::error::Error::from($crate::error::Message {
            message: $msg.to_string(),
            parameters: {
                #[allow(unused_mut)]
                let mut v: Vec<(Option<String>, String)> = Vec::new();
                $($crate::error!(@param v $($rest)*);)?
                v
            },
        })
    );

    (@param $v:ident $key:expr => $value:expr $(, $($rest:tt)*)?) => {
        $v.push((Some($key.to_string()), $value.to_string()));
        $($crate::error!(@param $v $($rest)*);)?
    };

    (@param $v:ident $value:expr $(, $($rest:tt)*)?) => {
        $v.push((None, $value.to_string()));
        $($crate::error!(@param $v $($rest)*);)?
    };

    (@param $v:ident) => { };
}

pub trait Chainable<T> {
    /// On error, wraps the error as the cause of `outer`.
    fn chain(self, outer: impl Into<Error>) -> Result<T>;

    /// Like [`Chainable::chain()`] but only builds `outer` on error.
    fn chain_with<F, E>(self, f: F) -> Result<T>
        where F: FnOnce() -> E, E: Into<Error>;
}

impl<T, E: Into<Error>> Chainable<T> for Result<T, E> {
    #[track_caller]
    fn chain(self, outer: impl Into<Error>) -> Result<T> {
        self.map_err(|e| e.into().chain(outer.into()))
    }

    #[track_caller]
    fn chain_with<F, Err>(self, f: F) -> Result<T>
        where F: FnOnce() -> Err, Err: Into<Error>,
    {
        self.map_err(|e| e.into().chain(f().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_displays_outer_first() {
        let inner: Result<()> = err!("inner failure", "field" => "excerpt");
        let error = inner.chain(error!("outer failure")).unwrap_err();
        let rendered = error.to_string();

        let outer_at = rendered.find("outer failure").unwrap();
        let inner_at = rendered.find("inner failure").unwrap();
        assert!(outer_at < inner_at);
        assert!(rendered.contains("    field: excerpt"));
        assert_eq!(error.iter().count(), 2);
    }

    #[test]
    fn io_errors_convert() {
        fn open() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/definitely/not/here.md")?)
        }

        assert!(open().is_err());
    }
}
