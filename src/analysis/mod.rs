//! Pure analysis helpers shared by the detectors.

pub mod headers;
pub mod text;
pub mod urls;
