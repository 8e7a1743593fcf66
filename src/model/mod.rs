pub mod address;
pub mod common;
pub mod customer;
pub mod estimate;
pub mod job;
pub mod record;
pub mod service_request;
pub mod tenant_context;

pub use address::*;
pub use common::*;
pub use customer::*;
pub use estimate::*;
pub use job::*;
pub use record::*;
pub use service_request::*;
pub use tenant_context::*;
