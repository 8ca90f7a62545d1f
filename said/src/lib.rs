// Library interface for the said modules
// This allows tests and other binaries to import modules

pub mod candidates;
pub mod ingestion;
pub mod scraping;
pub mod sentence;
pub mod sources;
pub mod storage;
pub mod tokenize;
