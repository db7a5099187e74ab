//! Synthdef Core - unit-generator graph compiler
//!
//! This crate turns a graph of unit-generator instances, built in memory,
//! into the flat ordered form a synthesis server loads.
//!
//! # Core Abstractions
//!
//! ## Graph Elements
//!
//! - [`GE`] - Graph element: constant, single output, multichannel bundle,
//!   or a node that has not been expanded yet
//! - [`NodeRef`] - One output slot of a concrete node
//! - [`GraphBuilder`] - Records instances and controls in creation order
//!
//! ## Descriptors
//!
//! - [`UGenSpec`] - Static description of a unit generator: inputs, rates,
//!   output arity, flags, optional custom expansion
//! - [`Rate`] / [`RateSpec`] / [`RateRequirement`] - The rate model
//!
//! ## Compilation
//!
//! - [`compile()`] - Expansion, then ordering with common-subexpression
//!   elimination, then assembly into a [`SynthGraph`]
//! - [`Expansion`] - Context handed to custom expansion hooks
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use synthdef_core::{CompileOptions, GE, GraphBuilder, OutputArity, Rate, UGenSpec, compile};
//!
//! let sin = Arc::new(UGenSpec::new("SinOsc", Rate::Audio).input("freq").input("phase"));
//! let out = Arc::new(
//!     UGenSpec::new("Out", Rate::Audio)
//!         .input("bus")
//!         .variadic("channels")
//!         .outputs(OutputArity::Zero)
//!         .side_effect(),
//! );
//!
//! let mut b = GraphBuilder::new();
//! let sig = b.add(&sin, [GE::consts([440.0, 442.0]), GE::Const(0.0)]).unwrap();
//! b.add(&out, [GE::Const(0.0), sig]).unwrap();
//!
//! let graph = compile(&b, &CompileOptions::default()).unwrap();
//! assert_eq!(graph.find_all("SinOsc").len(), 2);
//! ```
//!
//! # Design Principles
//!
//! - **Deterministic**: the same builder always compiles to the same graph
//! - **Strictly backwards**: every node input refers to an earlier node
//! - **All-or-nothing**: any error aborts the compilation

pub mod builder;
pub mod compile;
pub mod error;
pub mod expand;
pub mod ge;
pub mod graph;
mod order;
pub mod rate;
pub mod spec;

pub use builder::{ControlDecl, GraphBuilder};
pub use compile::{CompileOptions, DEFAULT_MAX_NODES, compile, compile_def};
pub use error::CompileError;
pub use expand::{AUDIO_CONTROL, CONTROL, Expansion, Signal};
pub use ge::{GE, NodeRef, PendingId};
pub use graph::{Control, GraphViolation, Input, SynthDef, SynthGraph, UGen};
pub use rate::{A2K, Coercion, K2A, Rate, RateRequirement, RateSpec, coercion};
pub use spec::{ExpandFn, InputSpec, OutputArity, UGenFlags, UGenSpec};
