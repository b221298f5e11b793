//! Core data model of an ingested session.
//!
//! - [`Dataset`]: the resident sequences, annotations, variants, tracks and alignment provider
//! - [`Feature`]: an annotated interval with qualifiers
//! - [`Variant`]: a variant-call record
//! - [`Read`]: an alignment record
//! - [`Track`]: a named numeric signal
//!
//! ## Coordinate conventions
//!
//! The source formats disagree on coordinates, so the model keeps two span types:
//!
//! | Entity | Span type | Convention |
//! |--------|-----------|------------|
//! | Feature | [`OneBasedSpan`] | 1-based, inclusive |
//! | Variant, Read, Track bin | [`ZeroBasedSpan`] | 0-based, half-open |
//!
//! BED intervals are converted into the feature convention on decode; GFF and
//! GenBank locations are already 1-based inclusive.
//!
//! [`Dataset`]: dataset::Dataset
//! [`Feature`]: feature::Feature
//! [`Variant`]: variant::Variant
//! [`Read`]: read::Read
//! [`Track`]: track::Track
//! [`OneBasedSpan`]: types::OneBasedSpan
//! [`ZeroBasedSpan`]: types::ZeroBasedSpan

pub mod dataset;
pub mod feature;
pub mod read;
pub mod track;
pub mod types;
pub mod variant;
