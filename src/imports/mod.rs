mod errors;
mod normalize;
mod record;
mod service;
mod source;

pub use errors::ImportError;
pub use normalize::normalize;
pub use record::ImportRecord;
pub use service::{importable_entries, ImportOutcome, ImportService};
