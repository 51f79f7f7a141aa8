//! Change detection and download pipeline for travel-advisory maps.
//!
//! [`coordinator::Coordinator`] runs [`processor::CountryProcessor`] for
//! every country in a [`MapStore`](mapwatch_core::store::MapStore). Each
//! country's page is fetched, a map URL is extracted, and maps not yet
//! recorded are claimed in the store, downloaded and finalized.

pub mod bootstrap;
pub mod config;
pub mod coordinator;
pub mod date;
pub mod download;
pub mod error;
pub mod extract;
pub mod http;
pub mod processor;
pub mod retry;

#[cfg(test)]
mod test_support;

pub use coordinator::{Coordinator, RunSummary};
pub use error::{ErrorKind, HttpError, ProcessError};
pub use processor::CountryProcessor;
