//! In-tree engine implementations.
//!
//! Real transports implement [`Engine`](crate::engine::Engine) in their
//! own crates; what lives here is the deterministic scripted engine used
//! by the tests and demos.

#[cfg(feature = "scripted")]
#[cfg_attr(docsrs, doc(cfg(feature = "scripted")))]
pub mod scripted;
