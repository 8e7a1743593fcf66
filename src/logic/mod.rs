pub mod address_reconcile;
pub mod form_session;
pub mod pricing;
pub mod submission;
pub mod validate;

pub use address_reconcile::*;
pub use form_session::*;
pub use pricing::*;
pub use submission::*;
pub use validate::*;
