//! Error types.
//!
//! Two layers:
//!
//! * [`Error`]: infrastructure failures surfaced to the host process, such as
//!   an unusable bind address, bad configuration or a broken route manifest.
//! * [`Fault`]: the per-request signal a middleware, hook or handler returns
//!   instead of a response. [`Fault::Early`] carries a finished response that
//!   is rendered verbatim (maintenance, rate limiting, explicit short-circuit);
//!   [`Fault::Internal`] is a genuine failure rendered as a `500`.

use std::fmt;
use std::path::PathBuf;

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::manifest::ManifestError;
use crate::response::Response;

/// The error type returned by pathwise's fallible setup operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),

    /// Production boot found no usable manifest and wrote a fresh one.
    /// The process must exit and be restarted against the new file.
    #[error("route manifest was missing or corrupt; rebuilt {} with {entries} routes, restart required", path.display())]
    ManifestRebuilt { path: PathBuf, entries: usize },
}

/// A request that stopped before producing a normal handler result.
///
/// Anything implementing [`std::error::Error`] converts into
/// `Fault::Internal`, so `?` works inside handlers:
///
/// ```rust,ignore
/// async fn show(req: Request) -> Result<Response, Fault> {
///     let id: u64 = req.param("id").unwrap_or_default().parse()?;
///     if id == 0 {
///         return Err(Fault::not_found(&json!({ "status": false })));
///     }
///     Ok(Response::json(&json!({ "id": id })))
/// }
/// ```
pub enum Fault {
    /// An intentional response that skips the rest of the pipeline.
    Early(Response),
    /// An unexpected failure.
    Internal(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Fault {
    /// Short-circuits with a JSON `payload` and `status`.
    pub fn respond<T: Serialize + ?Sized>(status: StatusCode, payload: &T) -> Self {
        Self::Early(Response::builder().status(status).json(payload))
    }

    /// An internal failure with a plain message.
    pub fn internal(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Internal(message.into())
    }

    pub fn bad_request<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self::respond(StatusCode::BAD_REQUEST, payload)
    }

    pub fn unauthorized<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self::respond(StatusCode::UNAUTHORIZED, payload)
    }

    pub fn forbidden<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self::respond(StatusCode::FORBIDDEN, payload)
    }

    pub fn not_found<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self::respond(StatusCode::NOT_FOUND, payload)
    }

    pub fn conflict<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self::respond(StatusCode::CONFLICT, payload)
    }

    pub fn unprocessable_entity<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self::respond(StatusCode::UNPROCESSABLE_ENTITY, payload)
    }

    pub fn too_many_requests<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self::respond(StatusCode::TOO_MANY_REQUESTS, payload)
    }

    pub fn service_unavailable<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self::respond(StatusCode::SERVICE_UNAVAILABLE, payload)
    }

    pub fn is_early(&self) -> bool {
        matches!(self, Self::Early(_))
    }

    /// The message followed by every `source()` below it.
    pub fn chain(&self) -> Vec<String> {
        match self {
            Self::Early(res) => vec![format!("early response ({})", res.status_code())],
            Self::Internal(err) => {
                let mut chain = vec![err.to_string()];
                let mut next = err.source();
                while let Some(cause) = next {
                    chain.push(cause.to_string());
                    next = cause.source();
                }
                chain
            }
        }
    }
}

impl<E> From<E> for Fault
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::Internal(Box::new(err))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Early(res) => write!(f, "early response ({})", res.status_code()),
            Self::Internal(err) => write!(f, "{err}"),
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Early(res) => f.debug_tuple("Early").field(&res.status_code()).finish(),
            Self::Internal(err) => f.debug_tuple("Internal").field(err).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn question_mark_converts_errors() {
        fn parse(s: &str) -> Result<u32, Fault> {
            Ok(s.parse::<u32>()?)
        }
        let fault = parse("x").unwrap_err();
        assert!(!fault.is_early());
    }

    #[test]
    fn chain_walks_sources() {
        let fault = Fault::from(Outer(std::io::Error::other("inner")));
        assert_eq!(fault.chain(), vec!["outer".to_owned(), "inner".to_owned()]);
    }

    #[test]
    fn early_carries_payload() {
        let fault = Fault::too_many_requests(&serde_json::json!({ "code": "slow-down" }));
        match fault {
            Fault::Early(res) => {
                assert_eq!(res.status_code(), StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(res.body_json().unwrap()["code"], "slow-down");
            }
            Fault::Internal(_) => panic!("expected early response"),
        }
    }
}
