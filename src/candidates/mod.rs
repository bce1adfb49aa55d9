pub mod loader;
pub mod quality;
pub mod schema;

pub use loader::{candidates_from_table, load_candidates, CandidateSnapshot};
pub use quality::{quality_report, ColumnQuality, QualityReport};
pub use schema::{validate_records, Candidate, CandidateRecord, DistrictId, SchemaError};
