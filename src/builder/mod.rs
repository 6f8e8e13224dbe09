//! Dynamic construction of types, members, and their tokens.
//!
//! The entry point is [`ModuleBuilder`], a container that hands out opaque
//! handles for defined entities and walks each one through the builder
//! lifecycle:
//!
//! 1. **Define** reserves a provisional (pending) token so entities can
//!    reference each other in any order, including forward references from
//!    instruction streams.
//! 2. **Create** freezes a type together with its members and generic
//!    parameters, assigns final tokens in creation order, and publishes
//!    immutable [`TypeInfo`] / [`MethodInfo`] / [`FieldInfo`] /
//!    [`GenericParamInfo`] snapshots.
//! 3. **Commit** patches pending tokens inside every baked body and streams
//!    the encoded results to a [`BodySink`], exactly once per container.
//!
//! Attribute carriers ([`TypeAttributes`], [`MethodAttributes`],
//! [`FieldAttributes`], [`GenericParamAttributes`]) mirror the ECMA-335
//! flag values bit for bit, so created entities can be fed straight into a
//! metadata writer.

mod fields;
mod generics;
mod interner;
mod methods;
mod module;
mod types;

pub use fields::{FieldAttributes, FieldHandle, FieldInfo};
pub use generics::{GenericParamAttributes, GenericParamHandle, GenericParamInfo};
pub use methods::{MethodAttributes, MethodHandle, MethodInfo};
pub use module::{BodySink, ModuleBuilder};
pub use types::{TypeAttributes, TypeHandle, TypeInfo};
