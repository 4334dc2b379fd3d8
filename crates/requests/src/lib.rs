//! Procurement request domain module (requisitions raised by departments).
//!
//! Pure domain logic only: no IO, no HTTP, no storage.

pub mod request;
pub mod stats;

pub use request::{
    AddItem, ApproveRequest, CancelRequest, CompleteRequest, CreateRequest, Priority,
    ProcurementRequest, RejectRequest, RemoveItem, RequestCommand, RequestEvent, RequestId,
    RequestItem, RequestStatus, StartReview, SubmitRequest, UpdateRequest,
};
pub use stats::{RequestStats, request_stats};
