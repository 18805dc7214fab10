//! Estthmar Ingest: PDF page extraction, chunking, and index ingestion.

pub mod chunking;
pub mod file;
pub mod ingest;

pub use chunking::{RecursiveChunker, TextChunk};
pub use file::extract_pdf_pages;
pub use ingest::{IngestReport, Ingester};
