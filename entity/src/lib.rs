pub mod messages;
pub mod prelude;

/// A type alias that represents any Entity's internal id field data type.
/// User ids issued by the identity provider are 64-bit integers, and message
/// ids share the representation.
pub type Id = i64;
