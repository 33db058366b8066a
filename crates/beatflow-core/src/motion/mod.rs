pub mod aggregate;
pub mod block_match;
pub mod field;
pub mod filter;
pub mod units;

pub use block_match::{estimate, estimate_with_progress, AnalysisParameters};
pub use field::{ScalarField, VectorField};
pub use units::{from_units, to_units, UnitScale};
