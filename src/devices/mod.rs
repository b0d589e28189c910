//! Typed device facades.
//!
//! One module per device kind. Each facade composes a
//! [`DeviceProxy`](crate::proxy::DeviceProxy) with one
//! [`UpdateDispatcher`](crate::dispatcher::UpdateDispatcher) per update
//! category, and adds the kind-specific listener registration and request
//! methods on top. The shared lifecycle/status/replay API is reached
//! through `Deref` to the inner proxy.

pub mod analog;
pub mod button;
pub mod force;
pub mod function_generator;
pub mod text;
pub mod tracker;

pub use analog::*;
pub use button::*;
pub use force::*;
pub use function_generator::*;
pub use text::*;
pub use tracker::*;
