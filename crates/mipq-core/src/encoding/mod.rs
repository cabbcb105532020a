//! Conversions between external representations and mipq types.
//!
//! - [`json`]: JSON expressions, records and values, coerced against the
//!   declared property types of a model.

pub mod json;
