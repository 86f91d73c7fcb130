//! The endpoint engine: a transport-agnostic message loop that
//! correlates outbound requests with their responses, dispatches inbound
//! requests and notifications to registered handlers, and propagates
//! cancellation in both directions.

pub mod cancel;
pub mod error;
pub mod session;

pub use cancel::CancelToken;
pub use error::{EndpointError, EndpointResult};
pub use session::{NotificationHandler, ProgressReporter, RequestContext, RequestHandler, Session};
