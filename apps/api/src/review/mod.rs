// Review domain: the fixed Review schema, the normalizer that coerces raw model
// output into it, and the derived scores and summary.

pub mod models;
pub mod normalizer;
pub mod scoring;

pub use models::{Review, Severity};
pub use normalizer::{normalize, Provenance, ReviewContext};
