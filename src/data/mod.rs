//! Typed data identities, suppliers, supplies and the data catalog.
//!
//! These are the leaf types of the engine:
//!
//! - [`DataDependency`] - "a value of type T in scope S", the key of all lookups
//! - [`DataSupplier`] - produces values for dependencies, may itself consume data
//! - [`DataSupply`] - a resolved binding of one supplier to one dependency
//! - [`DataCatalog`] - registry the resolver falls back to
//! - [`ScopeRules`] / [`ConsumerNeeds`] - what elements declare about their data
//!
//! The resolver in [`crate::resolver`] combines them into a plan; the render
//! pipeline in [`crate::render`] replays that plan per request.

mod catalog;
mod dependency;
mod path;
mod rules;
mod supplier;
mod supply;

pub use catalog::DataCatalog;
pub use dependency::{DataDependency, DataType, DataValue, ScopeName};
pub use path::{display_value, select_path};
pub use rules::{ConsumerNeeds, DataConsumer, ScopeRules, SuppliedDependency};
pub use supplier::{
    DataSupplier, DerivedValueSupplier, FnSupplier, RequestSupplier, StaticValueSupplier,
};
pub use supply::{ComputedSupply, DataSupply, ItemSupply, OnSupplyAction, Producer, SupplyActions};
