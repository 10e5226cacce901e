pub mod envelope;
pub mod error;
pub mod requests;
pub mod responses;


pub use envelope::{Envelope, StatusCode};
pub use error::{Result, RvError};
pub use requests::{MethodName, Request, RequestId, RpcParams};
pub use responses::Response;
