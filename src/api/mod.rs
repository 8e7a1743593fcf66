pub mod estimate_handlers;
pub mod handlers;
pub mod routes;
pub mod tenant_extractor;
pub mod work_handlers;

pub use estimate_handlers::*;
pub use handlers::*;
pub use routes::*;
pub use work_handlers::*;
