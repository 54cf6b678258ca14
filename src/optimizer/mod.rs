pub mod constraints;
pub mod cost_model;
pub mod error;
pub mod prioritizer;
pub mod reconcile;
pub mod strategies;
pub mod types;

pub use constraints::*;
pub use cost_model::*;
pub use error::*;
pub use prioritizer::*;
pub use reconcile::*;
pub use strategies::*;
pub use types::*;
