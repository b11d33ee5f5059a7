//! Network side of the dispatcher: transport seam, HTTP implementation,
//! the offline-first client and the queue replayer.

mod client;
mod http;
mod record;
mod replay;
mod response;
mod transport;

pub use client::OfflineClient;
pub use http::HttpTransport;
pub use record::Record;
pub use replay::{DrainOutcome, ReplayState, Replayer};
pub use response::{
  ApiResult, Source, MSG_NO_CONNECTIVITY, MSG_NO_DATA, STATUS_DEGRADED, STATUS_OK,
};
pub use transport::{Method, Request, Response, Transport, TransportError};
