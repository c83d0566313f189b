pub mod domain;
pub mod error;
pub mod fixture;
pub mod protocol;
pub mod reconcile;
