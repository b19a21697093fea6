//! Property-based invariant tests for the parameter store and frame sequencing.
//!
//! 1. Every setter leaves its parameter inside the declared range.
//! 2. The named option surface clamps the same way as the typed setters.
//! 3. `quality` always lies in [0, 1].
//! 4. Any sequence of frames, toggles, block-size changes and injected
//!    failures never touches a released buffer and never leaks one.

mod common;

use common::{MockContext, MockImage, MockKernel};
use datamosh::params::{BLOCK_SIZE_RANGE, DIFFUSION_RANGE, ENTROPY_RANGE, VELOCITY_SCALE_RANGE};
use datamosh::{DatamoshEffect, DatamoshParams, EffectConfig, Extent, FrameOutcome, KernelPass, ParameterValue};
use proptest::prelude::*;

// ── Parameter clamping ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn block_size_always_in_range(value in any::<i64>()) {
        let mut params = DatamoshParams::default();
        params.set_block_size(value);
        prop_assert!(BLOCK_SIZE_RANGE.contains(&params.block_size()), "{} -> {}", value, params.block_size());
    }

    #[test]
    fn float_params_always_in_range(
        entropy in any::<f32>(),
        velocity in any::<f32>(),
        diffusion in any::<f32>()
    ) {
        let mut params = DatamoshParams::default();
        params.set_entropy(entropy);
        params.set_velocity_scale(velocity);
        params.set_diffusion(diffusion);

        prop_assert!(ENTROPY_RANGE.contains(&params.entropy()), "entropy {} -> {}", entropy, params.entropy());
        prop_assert!(VELOCITY_SCALE_RANGE.contains(&params.velocity_scale()));
        prop_assert!(DIFFUSION_RANGE.contains(&params.diffusion()));
        prop_assert!((0.0..=1.0).contains(&params.quality()));
    }

    #[test]
    fn in_range_values_are_kept(entropy in 0.0f32..=1.0, block in 1i64..=128) {
        let mut params = DatamoshParams::default();
        params.set_entropy(entropy);
        params.set_block_size(block);
        prop_assert_eq!(params.entropy(), entropy);
        prop_assert_eq!(i64::from(params.block_size()), block);
    }

    #[test]
    fn named_surface_clamps_like_setters(value in any::<f32>()) {
        let mut named = DatamoshParams::default();
        let mut typed = DatamoshParams::default();

        for name in ["entropy", "velocity_scale", "diffusion", "block_size"] {
            prop_assert!(named.set(name, ParameterValue::Float(value)));
        }
        typed.set_entropy(value);
        typed.set_velocity_scale(value);
        typed.set_diffusion(value);
        typed.set_block_size(i64::from(ParameterValue::Float(value).as_i32()));

        prop_assert_eq!(named, typed);
    }
}

#[test]
fn nan_lands_on_lower_bound() {
    let mut params = DatamoshParams::default();
    params.set_entropy(f32::NAN);
    params.set_velocity_scale(f32::NAN);
    params.set_diffusion(f32::NAN);
    assert_eq!(params.entropy(), 0.0);
    assert_eq!(params.velocity_scale(), 0.0);
    assert_eq!(params.diffusion(), 0.0);
}

// ── Frame sequencing ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Frame,
    SetEnabled(bool),
    SetBlockSize(i64),
    FailNextAcquire,
    FailPass(KernelPass),
    Reset,
    Reactivate,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => Just(Op::Frame),
        1 => any::<bool>().prop_map(Op::SetEnabled),
        1 => (-4i64..200).prop_map(Op::SetBlockSize),
        1 => Just(Op::FailNextAcquire),
        1 => prop::sample::select(KernelPass::ALL.to_vec()).prop_map(Op::FailPass),
        1 => Just(Op::Reset),
        1 => Just(Op::Reactivate),
    ]
}

proptest! {
    #[test]
    fn any_op_sequence_keeps_buffers_sound(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut ctx = MockContext::new();
        let source = ctx.host_image(Extent::new(96, 64), 5);
        let destination = ctx.host_image(Extent::new(96, 64), 0);
        let mut effect =
            DatamoshEffect::<MockImage, MockKernel>::with_kernel(MockKernel::default(), &EffectConfig::default());
        effect.params_mut().set_enabled(true);
        effect.activate();

        for op in ops {
            match op {
                Op::Frame => {
                    let outcome = effect.process_frame(&mut ctx, &source, &destination);
                    if outcome.is_passthrough() {
                        prop_assert_eq!(ctx.value(&destination), ctx.value(&source));
                    }
                    if matches!(outcome, FrameOutcome::Degraded(_)) {
                        prop_assert_eq!(ctx.live_count(), 0);
                    }
                }
                Op::SetEnabled(enabled) => effect.params_mut().set_enabled(enabled),
                Op::SetBlockSize(block) => effect.params_mut().set_block_size(block),
                Op::FailNextAcquire => ctx.fail_acquires = 1,
                Op::FailPass(pass) => {
                    if let Some(kernel) = effect.kernel_mut() {
                        kernel.fail_on = Some(pass);
                    }
                }
                Op::Reset => effect.reset(&mut ctx),
                Op::Reactivate => {
                    effect.deactivate(&mut ctx);
                    effect.activate();
                }
            }

            // Held buffers come in pairs
            prop_assert!(ctx.live_count() == 0 || ctx.live_count() == 2);
            prop_assert_eq!(ctx.live_count() as u64, effect.controller().stats().live());
        }

        effect.deactivate(&mut ctx);
        prop_assert_eq!(ctx.live_count(), 0);
        prop_assert_eq!(ctx.acquisitions, ctx.releases);
    }
}
