//! Graph construction.
//!
//! [`GraphBuilder`] is the arena application code writes into. Every call to
//! [`add()`](GraphBuilder::add) records a pending node and returns a
//! [`GE::Unexpanded`] handle for it; nothing is expanded until
//! [`compile()`](crate::compile). Argument counts are checked here, eagerly,
//! so a malformed call fails before any node exists.
//!
//! Named controls are grouped by rate. Each rate group becomes one control
//! node at expansion time, placed before every other node, which is why
//! [`control()`](GraphBuilder::control) can hand out a concrete
//! [`GE::Single`] immediately.

use std::sync::Arc;

use crate::error::CompileError;
use crate::ge::{GE, NodeRef, PendingId};
use crate::rate::{Rate, RateSpec};
use crate::spec::UGenSpec;

/// A node recorded by the builder but not yet expanded.
#[derive(Debug, Clone)]
pub(crate) struct PendingNode {
    pub spec: Arc<UGenSpec>,
    pub rate: RateSpec,
    /// `None` for a forward declaration that has not been defined yet.
    pub args: Option<Vec<GE>>,
}

/// A named external parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlDecl {
    /// Parameter name.
    pub name: String,
    /// Rate of the parameter (never [`Rate::Demand`]).
    pub rate: Rate,
    /// Initial value.
    pub default: f32,
    /// Rate group (and control node) the parameter belongs to.
    pub(crate) group: u32,
    /// Output slot on the group's control node.
    pub(crate) slot: u32,
}

/// Arena of pending nodes and controls making up one synth graph.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    pending: Vec<PendingNode>,
    controls: Vec<ControlDecl>,
    /// Control rates in order of first declaration, with their value counts.
    groups: Vec<(Rate, u32)>,
}

impl GraphBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an instance of `spec` at its declared rate.
    ///
    /// # Errors
    ///
    /// - [`CompileError::ArityMismatch`] if `args` does not match the
    ///   declared inputs.
    /// - [`CompileError::EmptyBundle`] if an argument contains an empty `Multi`.
    /// - [`CompileError::UnknownPending`] if an argument refers to a node from
    ///   another builder.
    pub fn add(
        &mut self,
        spec: &Arc<UGenSpec>,
        args: impl IntoIterator<Item = GE>,
    ) -> Result<GE, CompileError> {
        self.push(spec, spec.rate, args.into_iter().collect())
    }

    /// Records an instance of `spec` running at `rate`.
    ///
    /// # Errors
    ///
    /// Same as [`add()`](Self::add), plus [`CompileError::UnsupportedRate`]
    /// when the descriptor cannot run at `rate`.
    pub fn add_at(
        &mut self,
        spec: &Arc<UGenSpec>,
        rate: Rate,
        args: impl IntoIterator<Item = GE>,
    ) -> Result<GE, CompileError> {
        Self::check_rate(spec, rate)?;
        self.push(spec, RateSpec::Fixed(rate), args.into_iter().collect())
    }

    /// Declares a node whose arguments are supplied later with
    /// [`define()`](Self::define).
    ///
    /// Forward declarations let a node be referenced before its own inputs
    /// exist. A declaration that ends up depending on itself is rejected by
    /// the compiler with [`CompileError::CyclicGraph`].
    pub fn declare(&mut self, spec: &Arc<UGenSpec>) -> PendingId {
        let id = PendingId(self.pending.len() as u32);
        self.pending.push(PendingNode {
            spec: Arc::clone(spec),
            rate: spec.rate,
            args: None,
        });
        id
    }

    /// Declares a node running at `rate`; see [`declare()`](Self::declare).
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::UnsupportedRate`] when the descriptor cannot
    /// run at `rate`.
    pub fn declare_at(&mut self, spec: &Arc<UGenSpec>, rate: Rate) -> Result<PendingId, CompileError> {
        Self::check_rate(spec, rate)?;
        let id = self.declare(spec);
        self.pending[id.0 as usize].rate = RateSpec::Fixed(rate);
        Ok(id)
    }

    /// Supplies the arguments of a forward declaration.
    ///
    /// # Errors
    ///
    /// - [`CompileError::UnknownPending`] if `id` is not from this builder.
    /// - [`CompileError::AlreadyDefined`] if `id` already has arguments.
    /// - The argument errors of [`add()`](Self::add).
    pub fn define(
        &mut self,
        id: PendingId,
        args: impl IntoIterator<Item = GE>,
    ) -> Result<(), CompileError> {
        let node = self
            .pending
            .get(id.0 as usize)
            .ok_or(CompileError::UnknownPending(id))?;
        if node.args.is_some() {
            return Err(CompileError::AlreadyDefined {
                ugen: node.spec.name.clone(),
                id,
            });
        }
        let spec = Arc::clone(&node.spec);
        let args: Vec<GE> = args.into_iter().collect();
        self.check_args(&spec, &args)?;
        self.pending[id.0 as usize].args = Some(args);
        Ok(())
    }

    /// Declares a named control and returns its signal.
    ///
    /// # Errors
    ///
    /// - [`CompileError::DuplicateControl`] if the name is taken.
    /// - [`CompileError::UnsupportedRate`] for [`Rate::Demand`].
    pub fn control(
        &mut self,
        name: impl Into<String>,
        rate: Rate,
        default: f32,
    ) -> Result<GE, CompileError> {
        let name = name.into();
        if rate == Rate::Demand {
            return Err(CompileError::UnsupportedRate { ugen: name, rate });
        }
        if self.controls.iter().any(|c| c.name == name) {
            return Err(CompileError::DuplicateControl(name));
        }
        let group = match self.groups.iter().position(|(r, _)| *r == rate) {
            Some(g) => g,
            None => {
                self.groups.push((rate, 0));
                self.groups.len() - 1
            }
        };
        let slot = self.groups[group].1;
        self.groups[group].1 += 1;
        self.controls.push(ControlDecl {
            name,
            rate,
            default,
            group: group as u32,
            slot,
        });
        Ok(GE::Single(NodeRef::new(group as u32, slot)))
    }

    /// Number of pending nodes recorded so far.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no pending nodes were recorded.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Declared controls, in declaration order.
    pub fn controls(&self) -> &[ControlDecl] {
        &self.controls
    }

    pub(crate) fn pending_node(&self, id: PendingId) -> Option<&PendingNode> {
        self.pending.get(id.0 as usize)
    }

    pub(crate) fn pending_ids(&self) -> impl Iterator<Item = PendingId> + '_ {
        (0..self.pending.len() as u32).map(PendingId)
    }

    /// Control rate groups in node order, with their value counts.
    pub(crate) fn control_groups(&self) -> &[(Rate, u32)] {
        &self.groups
    }

    // --- Internal helpers ---

    fn push(
        &mut self,
        spec: &Arc<UGenSpec>,
        rate: RateSpec,
        args: Vec<GE>,
    ) -> Result<GE, CompileError> {
        self.check_args(spec, &args)?;
        let id = PendingId(self.pending.len() as u32);
        self.pending.push(PendingNode {
            spec: Arc::clone(spec),
            rate,
            args: Some(args),
        });
        Ok(GE::Unexpanded(id))
    }

    fn check_rate(spec: &UGenSpec, rate: Rate) -> Result<(), CompileError> {
        if spec.supports_rate(rate) {
            Ok(())
        } else {
            Err(CompileError::UnsupportedRate {
                ugen: spec.name.clone(),
                rate,
            })
        }
    }

    fn check_args(&self, spec: &UGenSpec, args: &[GE]) -> Result<(), CompileError> {
        if args.len() != spec.inputs.len() {
            return Err(CompileError::ArityMismatch {
                ugen: spec.name.clone(),
                expected: spec.inputs.len(),
                found: args.len(),
            });
        }
        let mut stack: Vec<&GE> = args.iter().collect();
        while let Some(ge) = stack.pop() {
            match ge {
                GE::Multi(channels) if channels.is_empty() => {
                    return Err(CompileError::EmptyBundle);
                }
                GE::Multi(channels) => stack.extend(channels.iter()),
                GE::Unexpanded(id) if id.0 as usize >= self.pending.len() => {
                    return Err(CompileError::UnknownPending(*id));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::OutputArity;

    fn osc() -> Arc<UGenSpec> {
        Arc::new(
            UGenSpec::new("SinOsc", Rate::Audio)
                .rates([Rate::Audio, Rate::Control])
                .input("freq")
                .input("phase"),
        )
    }

    #[test]
    fn test_add_returns_unexpanded_handle() {
        let mut b = GraphBuilder::new();
        let ge = b.add(&osc(), [GE::Const(440.0), GE::Const(0.0)]).unwrap();
        assert_eq!(ge, GE::Unexpanded(PendingId(0)));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_arity_checked_eagerly() {
        let mut b = GraphBuilder::new();
        let err = b.add(&osc(), [GE::Const(440.0)]).unwrap_err();
        assert_eq!(
            err,
            CompileError::ArityMismatch {
                ugen: "SinOsc".into(),
                expected: 2,
                found: 1
            }
        );
        assert!(b.is_empty());
    }

    #[test]
    fn test_empty_bundle_rejected() {
        let mut b = GraphBuilder::new();
        let err = b
            .add(&osc(), [GE::multi([GE::Multi(vec![])]), GE::Const(0.0)])
            .unwrap_err();
        assert_eq!(err, CompileError::EmptyBundle);
    }

    #[test]
    fn test_unknown_pending_rejected() {
        let mut b = GraphBuilder::new();
        let err = b
            .add(&osc(), [GE::Unexpanded(PendingId(7)), GE::Const(0.0)])
            .unwrap_err();
        assert_eq!(err, CompileError::UnknownPending(PendingId(7)));
    }

    #[test]
    fn test_add_at_checks_rate() {
        let mut b = GraphBuilder::new();
        assert!(b.add_at(&osc(), Rate::Control, [GE::Const(1.0), GE::Const(0.0)]).is_ok());
        let err = b
            .add_at(&osc(), Rate::Demand, [GE::Const(1.0), GE::Const(0.0)])
            .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedRate { rate: Rate::Demand, .. }));
    }

    #[test]
    fn test_declare_and_define() {
        let mut b = GraphBuilder::new();
        let id = b.declare(&osc());
        b.define(id, [GE::Const(1.0), GE::Const(0.0)]).unwrap();
        let again = b.define(id, [GE::Const(1.0), GE::Const(0.0)]);
        assert!(matches!(again, Err(CompileError::AlreadyDefined { .. })));
        assert!(matches!(
            b.define(PendingId(9), []),
            Err(CompileError::UnknownPending(_))
        ));
    }

    #[test]
    fn test_controls_grouped_by_rate() {
        let mut b = GraphBuilder::new();
        let freq = b.control("freq", Rate::Control, 440.0).unwrap();
        let amp = b.control("amp", Rate::Control, 0.1).unwrap();
        let input = b.control("in", Rate::Audio, 0.0).unwrap();
        let gate = b.control("gate", Rate::Control, 1.0).unwrap();

        assert_eq!(freq, GE::Single(NodeRef::new(0, 0)));
        assert_eq!(amp, GE::Single(NodeRef::new(0, 1)));
        assert_eq!(input, GE::Single(NodeRef::new(1, 0)));
        assert_eq!(gate, GE::Single(NodeRef::new(0, 2)));
        assert_eq!(b.control_groups(), &[(Rate::Control, 3), (Rate::Audio, 1)]);
    }

    #[test]
    fn test_control_errors() {
        let mut b = GraphBuilder::new();
        b.control("freq", Rate::Control, 440.0).unwrap();
        assert_eq!(
            b.control("freq", Rate::Audio, 1.0),
            Err(CompileError::DuplicateControl("freq".into()))
        );
        assert!(matches!(
            b.control("d", Rate::Demand, 0.0),
            Err(CompileError::UnsupportedRate { .. })
        ));
    }

    #[test]
    fn test_zero_input_spec() {
        let noise = Arc::new(UGenSpec::new("WhiteNoise", Rate::Audio).outputs(OutputArity::Fixed(1)));
        let mut b = GraphBuilder::new();
        assert!(b.add(&noise, []).is_ok());
    }
}
