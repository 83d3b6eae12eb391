//! WFS wire formats owned by the crate.
//!
//! [`filter`] builds the OGC Filter Encoding / WFS 1.1.0 request body
//! (element names and attribute ordering are a third-party endpoint
//! contract and must not drift); [`gml`] parses GML responses by
//! namespace-agnostic tag lookup.

pub mod filter;
pub mod gml;
