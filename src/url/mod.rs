//! URL handling module for DocScan
//!
//! This module provides URL normalization, same-origin checks, domain extraction
//! and mimetype guessing from URL or file names.

mod domain;
mod mime;
mod normalize;

pub use domain::{extract_domain, is_sub_address, parent_address};
pub use mime::{extension_for_mimetype, file_extension, guess_mimetype};
pub use normalize::{normalize_url, NormalizedUrl};
