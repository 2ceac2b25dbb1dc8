pub mod batch;
pub mod search;
pub mod settings;
pub mod source;
