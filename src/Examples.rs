//! examples of usage of RustedCollocation
/// BVP for ODEs examples
pub mod bvp_examples;
