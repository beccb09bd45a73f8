pub mod phase;

pub use phase::{Actor, Evaluator, Judge, Observer};
