pub mod annotations;
pub mod archive;
pub mod assemble;
pub mod captions;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod quirks;
pub mod render;
pub mod resources;
pub mod xml;
