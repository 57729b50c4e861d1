/// Seeded random number helpers
pub mod random;
/// Fork-join task batches with explicit join barriers
pub mod threading;
