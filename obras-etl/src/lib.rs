//! obras-etl library interface
//!
//! Record Fetcher, Normalizer, Loader and the pipeline that ties them
//! together. Exposed as a library for integration testing.

pub mod error;
pub mod fetcher;
pub mod loader;
pub mod normalizer;
pub mod pipeline;

pub use crate::error::{EtlError, FetchError};
pub use crate::fetcher::{ObrasGovClient, RecordSource, StaticSource};
pub use crate::normalizer::{normalize, Normalized, Normalizer, RecordError};
pub use crate::pipeline::{run_pipeline, RunReport};
