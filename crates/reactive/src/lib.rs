//! Ripple Reactive - Change-notification primitives for the Ripple query engine.
//!
//! This crate defines the two notification contracts every observable value
//! and collection in the engine must satisfy:
//!
//! - `ValueChange<T>`: a scalar changed, carrying (old, new)
//! - `CollectionChange<T>`: a collection changed structurally, as one of
//!   Reset / Add / Remove / Replace / Move
//!
//! plus the plumbing to deliver them:
//!
//! - `EventSource<E>`: an ordered subscriber list with re-entrancy-safe
//!   emission
//! - `ObservableCollection<T>`: the trait every watchable sequence implements
//! - `ObservableVec<T>`: the canonical mutable source collection
//! - `ObservedCell<T>`: a scalar cell that notifies only on real change
//!
//! All delivery is synchronous and single-threaded: a mutation raises exactly
//! one structural event before the mutating call returns, and subscribers run
//! inline in subscription order.

#![no_std]

extern crate alloc;

pub mod cell;
pub mod collection;
pub mod event;
pub mod publisher;

pub use cell::ObservedCell;
pub use collection::{ObservableCollection, ObservableVec};
pub use event::{CollectionChange, ValueChange};
pub use publisher::{EventSource, SubscriptionId};
