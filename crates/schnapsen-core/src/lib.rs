#![deny(warnings)]
pub mod model;
