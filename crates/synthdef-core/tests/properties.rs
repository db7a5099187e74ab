//! Property-based tests for the graph compiler.
//!
//! Checks multichannel fan-out counts, the wrap-around policy for bundles of
//! unequal width, topological validity of random graphs, determinism, and
//! that individual nodes survive deduplication.

use std::sync::Arc;

use proptest::prelude::*;
use proptest::sample::Index;
use synthdef_core::{
    CompileOptions, GE, GraphBuilder, Input, OutputArity, Rate, RateRequirement, RateSpec,
    SynthGraph, UGenSpec, compile,
};

fn sin_osc() -> Arc<UGenSpec> {
    Arc::new(
        UGenSpec::new("SinOsc", Rate::Audio)
            .input_at("freq", RateRequirement::MatchAudio)
            .input("phase"),
    )
}

fn add() -> Arc<UGenSpec> {
    Arc::new(UGenSpec::new("Add", RateSpec::MAYBE).input("a").input("b"))
}

fn noise() -> Arc<UGenSpec> {
    Arc::new(UGenSpec::new("WhiteNoise", Rate::Audio).individual())
}

fn out() -> Arc<UGenSpec> {
    Arc::new(
        UGenSpec::new("Out", Rate::Audio)
            .input("bus")
            .variadic("channels")
            .outputs(OutputArity::Zero)
            .side_effect(),
    )
}

/// Distinct constants so that no two channels are merged.
fn channel_values(base: f32, n: usize) -> Vec<f32> {
    (0..n).map(|i| base + i as f32).collect()
}

/// Upper bound on the channel count of any value in a random graph.
const MAX_LEAVES: usize = 256;

/// Builds a random graph from a list of operations over earlier values.
fn random_graph(ops: &[(u8, Index, Index)]) -> GraphBuilder {
    let (sin, add, noise, out) = (sin_osc(), add(), noise(), out());
    let mut b = GraphBuilder::new();
    let mut values = vec![GE::Const(1.0), GE::Const(2.0)];
    // Leaf-count bound per value, so nested fan-out stays small.
    let mut leaves = vec![1usize, 1];

    for (kind, x, y) in ops {
        let (i, j) = (x.index(values.len()), y.index(values.len()));
        let (a, c) = (values[i].clone(), values[j].clone());
        let kind = kind % 4;
        let n = match kind {
            0 => leaves[i] * leaves[j],
            1 => leaves[i],
            2 => 1,
            _ => leaves[i] + leaves[j],
        };
        // Every recorded node is compiled, so oversized ones are never recorded.
        if n > MAX_LEAVES {
            values.push(GE::Const(3.0));
            leaves.push(1);
            continue;
        }
        let v = match kind {
            0 => b.add(&add, [a, c]).unwrap(),
            1 => b.add(&sin, [a, GE::Const(0.0)]).unwrap(),
            2 => b.add(&noise, []).unwrap(),
            _ => GE::multi([a, c]),
        };
        values.push(v);
        leaves.push(n);
    }

    let last = values.last().cloned().unwrap_or(GE::Const(0.0));
    b.add(&out, [GE::Const(0.0), last]).unwrap();
    b
}

fn constant(graph: &SynthGraph, input: Input) -> f32 {
    graph.constant_value(input).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A bundle of width n in one input yields exactly n instances.
    #[test]
    fn fan_out_count(n in 1usize..16) {
        let mut b = GraphBuilder::new();
        b.add(&sin_osc(), [GE::consts(channel_values(100.0, n)), GE::Const(0.0)]).unwrap();
        let g = compile(&b, &CompileOptions::default()).unwrap();
        prop_assert_eq!(g.find_all("SinOsc").len(), n);
    }

    /// Bundles of widths a and b expand to max(a, b) instances, and channel i
    /// reads element i mod width from each bundle.
    #[test]
    fn wrap_policy(wa in 1usize..8, wb in 1usize..8) {
        let freqs = channel_values(100.0, wa);
        let phases = channel_values(0.0, wb);
        let mut b = GraphBuilder::new();
        b.add(&sin_osc(), [GE::consts(freqs.clone()), GE::consts(phases.clone())]).unwrap();
        let g = compile(&b, &CompileOptions::default()).unwrap();

        let width = wa.max(wb);
        prop_assert_eq!(g.node_count(), width);
        for (i, node) in g.nodes.iter().enumerate() {
            prop_assert_eq!(constant(&g, node.inputs[0]), freqs[i % wa]);
            prop_assert_eq!(constant(&g, node.inputs[1]), phases[i % wb]);
        }
    }

    /// Every compiled graph references strictly backwards.
    #[test]
    fn topological_validity(ops in prop::collection::vec((any::<u8>(), any::<Index>(), any::<Index>()), 1..40)) {
        let b = random_graph(&ops);
        let g = compile(&b, &CompileOptions::default()).unwrap();
        prop_assert_eq!(g.validate(), Ok(()));
        for (i, node) in g.nodes.iter().enumerate() {
            for r in node.node_inputs() {
                prop_assert!((r.node as usize) < i);
            }
        }
    }

    /// Compiling the same builder twice gives identical graphs.
    #[test]
    fn deterministic(ops in prop::collection::vec((any::<u8>(), any::<Index>(), any::<Index>()), 1..40)) {
        let b = random_graph(&ops);
        let first = compile(&b, &CompileOptions::default()).unwrap();
        let second = compile(&b, &CompileOptions::default()).unwrap();
        prop_assert_eq!(first, second);
    }

    /// n individual instances stay n nodes; n identical pure instances merge into one.
    #[test]
    fn individuality(n in 1usize..12) {
        let mut b = GraphBuilder::new();
        let noises: Vec<GE> = (0..n).map(|_| b.add(&noise(), []).unwrap()).collect();
        let oscs: Vec<GE> = (0..n)
            .map(|_| b.add(&sin_osc(), [GE::Const(440.0), GE::Const(0.0)]).unwrap())
            .collect();
        b.add(&out(), [GE::Const(0.0), GE::multi(noises.into_iter().chain(oscs))]).unwrap();
        let g = compile(&b, &CompileOptions::default()).unwrap();

        prop_assert_eq!(g.find_all("WhiteNoise").len(), n);
        prop_assert_eq!(g.find_all("SinOsc").len(), 1);
        let out = &g.nodes[g.find_all("Out")[0]];
        prop_assert_eq!(out.inputs.len(), 1 + 2 * n);
    }
}
