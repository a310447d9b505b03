pub(crate) mod adapter;
pub(crate) mod builtin;
pub(crate) mod registry;
pub(crate) mod svg;
