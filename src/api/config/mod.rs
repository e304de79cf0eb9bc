mod estimator;

pub use estimator::*;
