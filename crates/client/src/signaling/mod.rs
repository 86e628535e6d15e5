//! HTTP offer/answer signaling
//!
//! The inference server exposes a single `/offer` endpoint: the client POSTs
//! its finalized offer (after ICE gathering) with a bearer token and receives
//! the remote description in the response body. One round trip, no retries.

mod negotiator;
pub mod protocol;

pub use negotiator::Negotiator;
pub use protocol::{AnswerResponse, OfferRequest};
