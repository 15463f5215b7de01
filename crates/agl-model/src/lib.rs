//! Wire and domain types shared by the queue client, the worker and the span exporter.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

mod span;
pub use span::*;
