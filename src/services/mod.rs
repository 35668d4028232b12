pub mod aggregation;
pub mod family;
pub mod ids;
pub mod ingest;
pub mod notify;
