pub mod decision;
pub mod domain;
pub mod error;
pub mod model;
pub mod premium;
pub mod profile;
pub mod quote;
pub mod rules;
