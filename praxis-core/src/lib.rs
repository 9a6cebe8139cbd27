//! Praxis core
//!
//! The HTTP boundary every Praxis module plugs into: request/response
//! wrappers, the middleware chain that authentication and tenant guards hook
//! into, the framework error type and the logging bootstrap.

pub mod error;
pub mod http;
pub mod logging;
pub mod middleware;

pub use error::{Error, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use middleware::{HandlerFn, Middleware, MiddlewareChain, Next, RequestLoggingMiddleware, handler};
