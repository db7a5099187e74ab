//! Builtin descriptor catalog.

use std::sync::LazyLock;

use synthdef_core::{
    A2K, AUDIO_CONTROL, CONTROL, CompileError, Expansion, K2A, OutputArity, Rate,
    RateRequirement, RateSpec, Signal, UGenSpec,
};

use RateRequirement::{Exactly, MatchAudio};

const AUDIO_OR_CONTROL: [Rate; 2] = [Rate::Audio, Rate::Control];

/// Binary `Add` used by [`mix`] to sum channels.
static ADD: LazyLock<UGenSpec> = LazyLock::new(|| binary("Add"));

fn binary(name: &str) -> UGenSpec {
    UGenSpec::new(name, RateSpec::MAYBE).input("a").input("b")
}

fn filter(name: &str) -> UGenSpec {
    UGenSpec::new(name, RateSpec::MAYBE)
        .input_at("in", MatchAudio)
        .input("freq")
}

fn noise(name: &str) -> UGenSpec {
    UGenSpec::new(name, Rate::Audio)
        .rates(AUDIO_OR_CONTROL)
        .individual()
}

/// Every builtin descriptor, in registration order.
pub(crate) fn builtins() -> Vec<UGenSpec> {
    vec![
        // Controls and rate conversion
        UGenSpec::new(CONTROL, Rate::Control)
            .rates([Rate::Scalar, Rate::Control])
            .individual(),
        UGenSpec::new(AUDIO_CONTROL, Rate::Audio).individual(),
        UGenSpec::new(K2A, Rate::Audio).input("in"),
        UGenSpec::new(A2K, Rate::Control).input_at("in", Exactly(Rate::Audio)),
        // Oscillators
        UGenSpec::new("SinOsc", Rate::Audio)
            .rates(AUDIO_OR_CONTROL)
            .input_at("freq", MatchAudio)
            .input("phase"),
        UGenSpec::new("LFSaw", Rate::Audio)
            .rates(AUDIO_OR_CONTROL)
            .input("freq")
            .input("iphase"),
        UGenSpec::new("Saw", Rate::Audio)
            .rates(AUDIO_OR_CONTROL)
            .input_at("freq", MatchAudio),
        // Noise
        noise("WhiteNoise"),
        noise("PinkNoise"),
        // Filters
        filter("LPF"),
        filter("HPF"),
        // Panning and envelopes
        UGenSpec::new("Pan2", Rate::Audio)
            .rates(AUDIO_OR_CONTROL)
            .input_at("in", MatchAudio)
            .input("pos")
            .input("level")
            .outputs(OutputArity::Fixed(2)),
        UGenSpec::new("Line", Rate::Audio)
            .rates(AUDIO_OR_CONTROL)
            .input("start")
            .input("end")
            .input("dur")
            .input("doneAction")
            .done_flag(),
        // Output
        UGenSpec::new("Out", Rate::Audio)
            .rates(AUDIO_OR_CONTROL)
            .input("bus")
            .variadic("channels")
            .outputs(OutputArity::Zero)
            .side_effect(),
        // Demand rate
        UGenSpec::new("Demand", Rate::Audio)
            .rates(AUDIO_OR_CONTROL)
            .input_at("trig", MatchAudio)
            .input("reset")
            .variadic("demandUGens")
            .outputs(OutputArity::PerChannel(2)),
        UGenSpec::new("Dseq", Rate::Demand)
            .input("repeats")
            .variadic("list"),
        // Spectral
        UGenSpec::new("FFT", Rate::Control)
            .input("buffer")
            .input_at("in", Exactly(Rate::Audio))
            .input("hop")
            .input("wintype")
            .input("active")
            .input("winsize")
            .side_effect(),
        UGenSpec::new("IFFT", Rate::Audio)
            .rates(AUDIO_OR_CONTROL)
            .input("buffer")
            .input("wintype")
            .input("winsize"),
        UGenSpec::new("PV_MagAbove", Rate::Control)
            .input("buffer")
            .input("threshold"),
        // Arithmetic
        binary("Add"),
        binary("Mul"),
        UGenSpec::new("Mix", RateSpec::MAYBE)
            .variadic("in")
            .with_expand(mix),
    ]
}

/// Expansion hook of the `Mix` pseudo unit generator.
///
/// Sums the top-level channels of its input with a chain of `Add` nodes and
/// produces no node of its own. Channels that are themselves bundles are
/// summed element-wise through the usual multichannel expansion of `Add`.
/// A single channel passes through untouched; an input without channels
/// mixes to the constant `0`. A rate requested for the mix is applied to
/// every `Add`.
///
/// # Errors
///
/// Any expansion error of the generated `Add` nodes.
pub fn mix(ex: &mut Expansion<'_>, rate: RateSpec, args: Vec<Signal>) -> Result<Signal, CompileError> {
    let rate = match rate {
        RateSpec::Fixed(r) => RateSpec::Fixed(r),
        RateSpec::Maybe { .. } => RateSpec::MAYBE,
    };
    let mut channels = args.into_iter().flat_map(Signal::channels);
    let Some(first) = channels.next() else {
        return Ok(Signal::Const(0.0));
    };
    channels.try_fold(first, |sum, ch| ex.instantiate(&ADD, rate, vec![sum, ch]))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use synthdef_core::{CompileOptions, GE, GraphBuilder, Input, NodeRef, compile};

    use super::*;
    use crate::UGenRegistry;

    fn spec<'a>(registry: &'a UGenRegistry, name: &str) -> &'a Arc<UGenSpec> {
        registry.get(name).unwrap()
    }

    #[test]
    fn test_mix_sums_channels() {
        let reg = UGenRegistry::new();
        let mut b = GraphBuilder::new();
        let sigs = b
            .add(spec(&reg, "SinOsc"), [GE::consts([1.0, 2.0, 3.0]), GE::Const(0.0)])
            .unwrap();
        b.add(spec(&reg, "Mix"), [sigs]).unwrap();

        let g = compile(&b, &CompileOptions::default()).unwrap();
        let adds = g.find_all("Add");
        assert_eq!(adds.len(), 2);
        assert!(g.find_all("Mix").is_empty());
        assert_eq!(
            g.nodes[adds[1]].inputs[0],
            Input::Node(NodeRef::new(adds[0] as u32, 0))
        );
        assert_eq!(g.nodes[adds[1]].rate, Rate::Audio);
    }

    #[test]
    fn test_mix_single_channel_passes_through() {
        let reg = UGenRegistry::new();
        let mut b = GraphBuilder::new();
        let sig = b
            .add(spec(&reg, "SinOsc"), [GE::Const(440.0), GE::Const(0.0)])
            .unwrap();
        let mixed = b.add(spec(&reg, "Mix"), [sig]).unwrap();
        b.add(spec(&reg, "Out"), [GE::Const(0.0), mixed]).unwrap();

        let g = compile(&b, &CompileOptions::default()).unwrap();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.nodes[1].inputs[1], Input::Node(NodeRef::new(0, 0)));
    }

    #[test]
    fn test_mix_nested_bundles_sum_elementwise() {
        let reg = UGenRegistry::new();
        let mut b = GraphBuilder::new();
        let left = b
            .add(spec(&reg, "Pan2"), [GE::Const(0.1), GE::Const(-1.0), GE::Const(1.0)])
            .unwrap();
        let right = b
            .add(spec(&reg, "Pan2"), [GE::Const(0.2), GE::Const(1.0), GE::Const(1.0)])
            .unwrap();
        let mixed = b.add(spec(&reg, "Mix"), [GE::multi([left, right])]).unwrap();
        b.add(spec(&reg, "Out"), [GE::Const(0.0), mixed]).unwrap();

        let g = compile(&b, &CompileOptions::default()).unwrap();
        assert_eq!(g.find_all("Add").len(), 2);
        let out = &g.nodes[g.find_all("Out")[0]];
        assert_eq!(out.inputs.len(), 3);
    }

    #[test]
    fn test_mix_at_fixed_rate() {
        let reg = UGenRegistry::new();
        let mut b = GraphBuilder::new();
        let sigs = b
            .add(spec(&reg, "SinOsc"), [GE::consts([1.0, 2.0, 3.0]), GE::Const(0.0)])
            .unwrap();
        b.add_at(spec(&reg, "Mix"), Rate::Control, [sigs]).unwrap();

        let g = compile(&b, &CompileOptions::default()).unwrap();
        let adds = g.find_all("Add");
        assert_eq!(adds.len(), 2);
        for i in adds {
            assert_eq!(g.nodes[i].rate, Rate::Control);
            assert_eq!(g.nodes[i].outputs, vec![Rate::Control]);
        }
    }

    #[test]
    fn test_fft_requires_audio_input() {
        let reg = UGenRegistry::new();
        let mut b = GraphBuilder::new();
        let lfo = b
            .add_at(spec(&reg, "SinOsc"), Rate::Control, [GE::Const(1.0), GE::Const(0.0)])
            .unwrap();
        let args = [
            GE::Const(0.0),
            lfo,
            GE::Const(0.5),
            GE::Const(0.0),
            GE::Const(1.0),
            GE::Const(0.0),
        ];
        b.add(spec(&reg, "FFT"), args).unwrap();

        let g = compile(&b, &CompileOptions::default()).unwrap();
        let names: Vec<&str> = g.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["SinOsc", "K2A", "FFT"]);
    }

    #[test]
    fn test_demand_outputs_follow_channels() {
        let reg = UGenRegistry::new();
        let mut b = GraphBuilder::new();
        let seq_a = b
            .add(spec(&reg, "Dseq"), [GE::Const(1.0), GE::consts([1.0, 2.0])])
            .unwrap();
        let seq_b = b
            .add(spec(&reg, "Dseq"), [GE::Const(2.0), GE::consts([3.0, 4.0])])
            .unwrap();
        b.add(
            spec(&reg, "Demand"),
            [GE::Const(1.0), GE::Const(0.0), GE::multi([seq_a, seq_b])],
        )
        .unwrap();

        let g = compile(&b, &CompileOptions::default()).unwrap();
        let demand = &g.nodes[g.find_all("Demand")[0]];
        assert_eq!(demand.output_count(), 2);
    }
}
