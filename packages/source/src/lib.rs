#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Source resolution, config validation, and record transformation.
//!
//! - [`registry`] maps a source API name to its group and scraping rule.
//! - [`validate`] checks a fetched config blob before anything else runs.
//! - [`response`] settles a fetched page into a plain record list.
//! - [`transform`] shapes that list into
//!   [`NormalizedRecord`](api_scraper_source_models::NormalizedRecord)s.

pub mod registry;
pub mod response;
pub mod timestamp;
pub mod transform;
pub mod validate;

pub use registry::{ApiMapping, ResolveError, ResolvedSource};
pub use response::resolve_response;
pub use timestamp::{Timestamp, TimestampError};
pub use transform::{RecordTransformer, TransformError, ensure_records_exist};
pub use validate::{ValidationError, validate, validate_and_parse};
