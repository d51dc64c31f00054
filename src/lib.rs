pub mod diff;
pub mod document;
pub mod error;
pub mod field;
pub mod hierarchy;
pub mod machine;
pub mod recipify;
pub mod rules;
pub mod service;
pub mod utils;
pub mod validation;
