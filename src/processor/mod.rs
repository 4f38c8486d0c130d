pub mod ingest;
pub mod join;
