pub mod extractor;
pub mod jwt;
