pub mod backfill;
pub mod rollup;
pub mod transcription;
