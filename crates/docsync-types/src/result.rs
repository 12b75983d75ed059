//! Result type alias for DocuSync operations

use crate::Error;

/// Result type alias for DocuSync operations
pub type Result<T> = std::result::Result<T, Error>;
