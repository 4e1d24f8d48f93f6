//! Domain types shared across the gateway components.

pub mod error;
pub mod one_or_many;

pub use error::{GatewayError, RepositoryContext, Result};
pub use one_or_many::OneOrMany;
