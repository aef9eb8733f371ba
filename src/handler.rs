//! Handler trait and type erasure.
//!
//! A controller holds handlers of *different* concrete types in one
//! `HashMap<Method, _>`. They are stored as trait objects behind a common
//! interface:
//!
//! ```text
//! async fn show(req: Request) -> Result<Json<User>, Fault> { … }   ← user code
//!        ↓ Controller::new().get(show)
//! show.into_boxed_handler()                                         ← blanket impl
//!        ↓
//! Arc::new(FnHandler(show))        stored as BoxedHandler = Arc<dyn ErasedHandler>
//!        ↓
//! handler.call(req)  at request time                                ← one vtable call
//!        ↓
//! Box::pin(async { show(req).await.map(IntoResponse::into_response) })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Fault;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased handler future.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid controller action.
///
/// Satisfied automatically by any function with the shape
///
/// ```text
/// async fn name(req: Request) -> Result<impl IntoResponse, Fault>
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Fault>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Fault>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Holds a concrete handler `F` and bridges it to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Fault>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.map(IntoResponse::into_response) })
    }
}

/// A per-method pre-handler check declared by a controller.
///
/// Runs after the global middleware chain and before the handler; returning
/// `Err` skips the handler.
pub type Hook = Arc<dyn Fn(&mut Request) -> Result<(), Fault> + Send + Sync + 'static>;
