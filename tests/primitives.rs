use cellops::error::OpError;
use cellops::primitives::{
    ConvBnRelu, ConvPair, DilConv, FactorizedReduce, Identity, MidChannels, Op, Operation, PoolBranch, PoolKind,
    ReluConvBn, SepConv, Zero,
};
use cellops::registry::{Catalog, lookup};
use cellops::shape::Shape4;
use cellops::tensors::{Ten64, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_input(shape: [usize; 4], seed: u64) -> Ten64 {
    let mut rng = StdRng::seed_from_u64(seed);
    let len = shape.iter().product();
    Tensor::new(shape.to_vec(), (0..len).map(|_| rng.random_range(-1.0..1.0)).collect())
}

fn mid_channels(op: &Op) -> usize {
    // second parameter of a separable block is the first pointwise weight, [mid, c_in, 1, 1]
    op.parameters()[1].value.shape[0]
}

#[test]
fn test_factorized_reduce_requires_even_output() {
    for c_out in [1, 3, 7, 33] {
        let err = FactorizedReduce::new(8, c_out, 2, true).unwrap_err();
        assert!(matches!(err, OpError::InvalidChannelConfig { op: "factorized_reduce", .. }), "c_out={c_out}");
    }
    for c_out in [2, 4, 10, 32] {
        let op = FactorizedReduce::new(8, c_out, 2, true).unwrap();
        let y = op.forward(&random_input([2, 8, 6, 6], 3));
        assert_eq!(y.shape, vec![2, c_out, 3, 3]);
        let (a, b) = op.paths();
        assert_eq!(a.out_channels(), c_out / 2);
        assert_eq!(b.out_channels(), c_out / 2);
    }
}

#[test]
fn test_factorized_reduce_paths_sample_disjoint_pixels() {
    // a single hot pixel at an odd position is only visible to the shifted path
    let mut x = Tensor::zeros(vec![1, 2, 4, 4]);
    x.data[4 + 1] = 5.0;
    let op = FactorizedReduce::new(2, 4, 2, false).unwrap();
    let (a, _) = op.paths();
    assert!(a.forward(&x).is_all_zero());
    assert!(!op.forward(&x).is_all_zero());
}

#[test]
fn test_zero_matches_strided_shape() {
    let x = random_input([3, 5, 9, 8], 11);

    let y = Zero::new(5, 5, 1).unwrap().forward(&x);
    assert_eq!(y.shape, x.shape);
    assert!(y.is_all_zero());

    let y = Zero::new(5, 8, 2).unwrap().forward(&x);
    assert_eq!(y.shape, vec![3, 5, 5, 4]);
    assert!(y.is_all_zero());

    assert!(matches!(Zero::new(5, 5, 0), Err(OpError::InvalidStride { .. })));
    assert!(matches!(Zero::new(0, 0, 1), Err(OpError::InvalidChannelConfig { op: "zero", .. })));
}

#[test]
fn test_identity_is_deep_equal() {
    let x = random_input([2, 6, 5, 7], 5);
    let before = x.clone();
    let op = Identity::new(6, 6, 1).unwrap();
    assert_eq!(op.forward(&x), x);
    assert_eq!(x, before);
    assert_eq!(op.param_count(), 0);
}

#[test]
fn test_identity_rejects_invalid_configs() {
    let err = Identity::new(6, 6, 2).unwrap_err();
    assert!(matches!(err, OpError::InvalidStride { op: "identity", stride: 2, .. }));
    let err = Identity::new(6, 8, 1).unwrap_err();
    assert!(matches!(err, OpError::InvalidChannelConfig { op: "identity", .. }));
}

#[test]
fn test_capacity_variants_resolve_their_bottleneck() {
    let cases = [
        ("sep_conv_3x3", 16, 24, 24),
        ("dil_conv_5x5", 16, 24, 24),
        ("flood_conv_3x3", 16, 24, 96),
        ("dil_flood_conv_3x3", 8, 6, 24),
        ("choke_conv_3x3", 16, 24, 32),
        ("dil_choke_conv_3x3", 64, 128, 32),
    ];
    for (key, c_in, c_out, mid) in cases {
        let op = lookup(Catalog::Primary, key).unwrap().build(c_in, c_out, 1, true).unwrap();
        assert_eq!(mid_channels(&op), mid, "{key}");
        assert_eq!(op.parameters()[1].value.shape, vec![mid, c_in, 1, 1], "{key}");
        let y = op.forward(&random_input([1, c_in, 6, 6], 9));
        assert_eq!(y.shape, vec![1, c_out, 6, 6], "{key}");
    }
}

#[test]
fn test_mid_channels_round_to_nearest() {
    assert_eq!(MidChannels::Multiplier(1.5).resolve(5), 8);
    assert_eq!(MidChannels::Multiplier(0.5).resolve(7), 4);
    assert_eq!(MidChannels::Fixed(32).resolve(7), 32);
    assert!(matches!(
        SepConv::new(4, 4, 3, 1, 1, 1, true, MidChannels::Multiplier(0.1)),
        Err(OpError::InvalidChannelConfig { .. })
    ));
}

#[test]
fn test_sep_conv_parameter_layout() {
    let op = SepConv::new(4, 6, 5, 2, 2, 1, true, MidChannels::Fixed(3)).unwrap();
    let shapes: Vec<Vec<usize>> = op.parameters().iter().map(|p| p.value.shape.clone()).collect();
    assert_eq!(
        shapes,
        vec![
            vec![4, 1, 5, 5],
            vec![3, 4, 1, 1],
            vec![3],
            vec![3],
            vec![3, 1, 5, 5],
            vec![6, 3, 1, 1],
            vec![6],
            vec![6],
        ]
    );

    let plain = SepConv::new(4, 6, 5, 2, 2, 1, false, MidChannels::Fixed(3)).unwrap();
    assert_eq!(plain.parameters().len(), 4);
}

#[test]
fn test_geometry_is_checked_at_construction() {
    let mid = MidChannels::default();
    // even kernel, non-"same" padding, zero kernel, zero dilation
    let cases = [
        SepConv::new(4, 4, 4, 1, 1, 1, true, mid).map(Op::from),
        SepConv::new(4, 4, 3, 1, 0, 1, true, mid).map(Op::from),
        SepConv::new(4, 4, 3, 1, 1, 2, true, mid).map(Op::from),
        SepConv::new(4, 4, 0, 1, 0, 1, true, mid).map(Op::from),
        DilConv::new(4, 4, 3, 1, 2, 0, true).map(Op::from),
        DilConv::new(4, 4, 5, 1, 2, 2, true).map(Op::from),
        ConvPair::new(4, 4, 0, 1, true, 1e-3).map(Op::from),
        ConvPair::new(4, 4, 6, 1, true, 1e-3).map(Op::from),
        ReluConvBn::new(4, 4, 2, 1, 0, true).map(Op::from),
        ConvBnRelu::new(4, 4, 3, 1, 0, true).map(Op::from),
    ];
    for (i, built) in cases.into_iter().enumerate() {
        assert!(matches!(built, Err(OpError::InvalidGeometry { .. })), "case {i}");
    }
}

#[test]
fn test_infinite_multiplier_is_rejected() {
    for m in [f64::INFINITY, f64::NAN, -2.0] {
        let err = SepConv::new(4, 4, 3, 1, 1, 1, true, MidChannels::Multiplier(m)).unwrap_err();
        assert!(matches!(err, OpError::InvalidChannelConfig { op: "sep_conv", .. }), "multiplier {m}");
    }
}

#[test]
fn test_pool_errors_name_their_kind() {
    let err = PoolBranch::new(PoolKind::Avg, 0, 4, 1, true, 1e-3).unwrap_err();
    assert!(matches!(err, OpError::InvalidChannelConfig { op: "avg_pool", .. }));
    let err = PoolBranch::new(PoolKind::Max, 4, 4, 0, true, 1e-3).unwrap_err();
    assert!(matches!(err, OpError::InvalidStride { op: "max_pool", .. }));
    assert_eq!(PoolBranch::new(PoolKind::Max, 4, 4, 1, true, 1e-3).unwrap().name(), "max_pool");
}

#[test]
fn test_pool_projects_only_on_width_change() {
    let same = PoolBranch::new(PoolKind::Max, 8, 8, 1, true, 1e-3).unwrap();
    assert!(!same.is_projected());
    assert_eq!(same.param_count(), 0);

    let wider = PoolBranch::new(PoolKind::Avg, 8, 12, 2, true, 1e-3).unwrap();
    assert!(wider.is_projected());
    assert_eq!(wider.param_count(), 8 * 12 + 2 * 12);
    assert_eq!(wider.forward(&random_input([2, 8, 5, 5], 2)).shape, vec![2, 12, 3, 3]);
}

#[test]
fn test_avg_pool_of_constant_stays_constant() {
    let op = PoolBranch::new(PoolKind::Avg, 3, 3, 2, true, 1e-5).unwrap();
    let y = op.forward(&Tensor::full(vec![1, 3, 7, 7], 2.5));
    assert_eq!(y.shape, vec![1, 3, 4, 4]);
    assert!(y.data.iter().all(|v| (v - 2.5).abs() < 1e-12));
}

#[test]
fn test_max_pool_never_exceeds_input_max() {
    let x = random_input([2, 4, 6, 6], 21);
    let max = x.data.iter().cloned().fold(f64::MIN, f64::max);
    let y = PoolBranch::new(PoolKind::Max, 4, 4, 2, false, 1e-5).unwrap().forward(&x);
    assert!(y.data.iter().all(|v| *v <= max));
}

#[test]
fn test_conv_pair_splits_stride() {
    let op = ConvPair::new(6, 10, 7, 2, true, 1e-3).unwrap();
    let y = op.forward(&random_input([1, 6, 9, 12], 4));
    assert_eq!(y.shape, vec![1, 10, 5, 6]);
    assert_eq!(op.output_shape(Shape4::new(1, 6, 9, 12)), Shape4::new(1, 10, 5, 6));
}

#[test]
fn test_batch_norm_output_is_normalized() {
    let op = lookup(Catalog::Legacy, "nor_conv_3x3").unwrap().build(4, 4, 1, false).unwrap();
    let y = op.forward(&random_input([4, 4, 6, 6], 8));
    // relu after bn: everything non-negative, and roughly half of each channel survives
    assert!(y.data.iter().all(|v| *v >= 0.0));
    assert!(!y.is_all_zero());
}

#[test]
fn test_forward_does_not_mutate_input() {
    let x = random_input([2, 8, 6, 6], 13);
    let before = x.clone();
    for catalog in Catalog::ALL {
        for &primitive in catalog.keys() {
            let op = lookup(catalog, primitive.key()).unwrap().build(8, 8, 2, true).unwrap();
            let _ = op.forward(&x);
            assert_eq!(x, before, "{catalog}/{primitive}");
        }
    }
}

#[test]
#[should_panic(expected = "input channels")]
fn test_forward_panics_on_wrong_channels() {
    let op = lookup(Catalog::Primary, "sep_conv_3x3").unwrap().build(8, 8, 1, true).unwrap();
    let _ = op.forward(&random_input([1, 4, 6, 6], 0));
}

#[test]
fn test_sgd_step_moves_weights() {
    let mut op = lookup(Catalog::Primary, "dil_conv_3x3").unwrap().build(4, 4, 1, true).unwrap();
    let before: Vec<f64> = op.parameters()[0].value.data.clone();
    for p in op.parameters_mut() {
        p.grad.data.iter_mut().for_each(|g| *g = 1.0);
    }
    op.sgd_step(0.5);
    let params = op.parameters();
    let after = &params[0].value.data;
    assert!(before.iter().zip(after).all(|(b, a)| (b - 0.5 - a).abs() < 1e-12));

    drop(params);
    op.zero_grad();
    assert!(op.parameters().iter().all(|p| p.grad.is_all_zero()));
}

#[test]
fn test_operations_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Op>();

    let op = lookup(Catalog::Primary, "sep_conv_3x3").unwrap().build(4, 8, 2, true).unwrap();
    let inputs: Vec<Ten64> = (0..4).map(|seed| random_input([1, 4, 8, 8], seed)).collect();
    let serial: Vec<Ten64> = inputs.iter().map(|x| op.forward(x)).collect();

    let shared = &op;
    let parallel: Vec<Ten64> = std::thread::scope(|s| {
        let handles: Vec<_> = inputs.iter().map(|x| s.spawn(move || shared.forward(x))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(serial, parallel);
}
