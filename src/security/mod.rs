//! Security utilities for handling untrusted names read from evidence.

pub mod path_validator;

pub use path_validator::{flatten_parent_path, sanitize_component, validate_relative};
