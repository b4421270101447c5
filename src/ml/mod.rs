//! Framework-agnostic statistical models: outlier scoring for the anomaly
//! detector and the advisory collaborative-filtering recommender. Nothing in
//! this module touches the database.

/// Isolation forest outlier model
pub mod isolation_forest;

/// Matrix-factorization recommender with snapshot swapping
pub mod recommender;
