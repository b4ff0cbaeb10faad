//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod decode;
pub(crate) mod encode;

pub(crate) use build::BuildArgs;
pub(crate) use decode::DecodeArgs;
pub(crate) use encode::EncodeArgs;
