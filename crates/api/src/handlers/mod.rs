pub mod ingest;
pub mod rundown;
