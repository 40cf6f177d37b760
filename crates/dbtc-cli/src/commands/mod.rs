//! CLI command implementations

pub(crate) mod apply;
pub(crate) mod common;
pub(crate) mod destroy;
pub(crate) mod import;
pub(crate) mod ls;
pub(crate) mod output;
pub(crate) mod plan;
pub(crate) mod status;
pub(crate) mod validate;
