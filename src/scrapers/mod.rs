pub mod discovery;
pub mod district;
pub mod error;
pub mod fetcher;
pub mod pagination;
pub mod parser;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use fetcher::HttpFetcher;
