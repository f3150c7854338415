use cellops::assembly::Assembly;
use cellops::error::OpError;
use cellops::primitives::{Op, Operation};
use cellops::registry::{Catalog, Primitive, lookup};
use cellops::shape::Shape4;
use cellops::tensors::{Ten64, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_input(shape: [usize; 4], seed: u64) -> Ten64 {
    let mut rng = StdRng::seed_from_u64(seed);
    let len = shape.iter().product();
    Tensor::new(shape.to_vec(), (0..len).map(|_| rng.random_range(-1.0..1.0)).collect())
}

/// Channel pairs each catalog accepts for every key at stride 2.
fn channel_pairs(catalog: Catalog) -> &'static [(usize, usize)] {
    match catalog {
        Catalog::Primary => &[(8, 8), (8, 16), (12, 4)],
        Catalog::Legacy => &[(8, 8)],
    }
}

#[test]
fn test_every_key_honours_the_shape_contract() {
    let (h, w) = (8, 6);
    for catalog in Catalog::ALL {
        for &primitive in catalog.keys() {
            for &(c_in, c_out) in channel_pairs(catalog) {
                for stride in [1, 2] {
                    if primitive == Primitive::SkipConnect && stride == 1 && c_in != c_out {
                        continue;
                    }
                    for (n, affine) in [(1, true), (3, false)] {
                        let op = lookup(catalog, primitive.key())
                            .and_then(|ctor| ctor.build(c_in, c_out, stride, affine))
                            .unwrap_or_else(|e| panic!("{catalog}/{primitive} ({c_in}->{c_out}, s{stride}): {e}"));

                        let x = random_input([n, c_in, h, w], 7);
                        let y = op.forward(&x);
                        let expected_c = if primitive == Primitive::None { c_in } else { c_out };
                        assert_eq!(
                            y.shape,
                            vec![n, expected_c, h / stride, w / stride],
                            "{catalog}/{primitive} ({c_in}->{c_out}, s{stride}, n{n})"
                        );
                        assert_eq!(op.output_shape(x.shape4()).to_vec(), y.shape);
                    }
                }
            }
        }
    }
}

#[test]
fn test_odd_extent_rounds_up() {
    for key in ["sep_conv_5x5", "skip_connect", "max_pool_3x3", "none", "conv_7x1_1x7"] {
        let op = lookup(Catalog::Primary, key).unwrap().build(4, 4, 2, true).unwrap();
        let y = op.forward(&random_input([2, 4, 7, 5], 1));
        assert_eq!(y.shape, vec![2, 4, 4, 3], "{key}");
    }
}

#[test]
fn test_unknown_keys_are_rejected_in_both_catalogs() {
    for catalog in Catalog::ALL {
        let err = lookup(catalog, "sep_conv_9x9").unwrap_err();
        assert_eq!(err, OpError::UnknownOperation { catalog: catalog.name(), key: "sep_conv_9x9".to_owned() });
    }
    assert!(matches!(lookup(Catalog::Primary, "nor_conv_3x3"), Err(OpError::UnknownOperation { .. })));
    assert!(matches!(lookup(Catalog::Legacy, "flood_conv_3x3"), Err(OpError::UnknownOperation { .. })));
    assert!(matches!(lookup(Catalog::Legacy, "choke_conv_3x3"), Err(OpError::UnknownOperation { .. })));
}

#[test]
fn test_documented_primary_keys_resolve() {
    let documented = [
        "none",
        "avg_pool_3x3",
        "max_pool_3x3",
        "skip_connect",
        "sep_conv_3x3",
        "sep_conv_5x5",
        "sep_conv_7x7",
        "dil_conv_3x3",
        "dil_conv_5x5",
        "conv_7x1_1x7",
        "flood_conv_3x3",
        "dil_flood_conv_3x3",
        "choke_conv_3x3",
        "dil_choke_conv_3x3",
    ];
    for key in documented {
        let ctor = lookup(Catalog::Primary, key).unwrap();
        assert_eq!(ctor.primitive().key(), key);
        assert_eq!(ctor.catalog(), Catalog::Primary);
    }
    assert_eq!(Catalog::Primary.keys().len(), documented.len());
}

#[test]
fn test_legacy_requires_equal_channels() {
    for &primitive in Catalog::Legacy.keys() {
        let err = lookup(Catalog::Legacy, primitive.key()).unwrap().build(8, 16, 1, true).unwrap_err();
        assert!(matches!(err, OpError::InvalidChannelConfig { .. }), "{primitive}");
    }
}

#[test]
fn test_zero_stride_is_rejected() {
    for catalog in Catalog::ALL {
        for &primitive in catalog.keys() {
            let err = lookup(catalog, primitive.key()).unwrap().build(8, 8, 0, true).unwrap_err();
            assert!(matches!(err, OpError::InvalidStride { stride: 0, .. }), "{catalog}/{primitive}");
        }
    }
}

#[test]
fn test_zero_channels_are_rejected() {
    for catalog in Catalog::ALL {
        for &primitive in catalog.keys() {
            let ctor = lookup(catalog, primitive.key()).unwrap();
            for stride in [1, 2] {
                for (c_in, c_out) in [(0, 0), (0, 8), (8, 0)] {
                    let err = ctor.build(c_in, c_out, stride, true).unwrap_err();
                    assert!(
                        matches!(err, OpError::InvalidChannelConfig { .. }),
                        "{catalog}/{primitive} ({c_in}->{c_out}, s{stride}): {err}"
                    );
                }
            }
        }
    }
}

#[test]
fn test_end_to_end_reduction_edges() {
    let x = random_input([2, 16, 32, 32], 42);

    let sep = lookup(Catalog::Primary, "sep_conv_3x3").unwrap().build(16, 32, 2, true).unwrap();
    assert_eq!(sep.forward(&x).shape, vec![2, 32, 16, 16]);

    let skip = lookup(Catalog::Primary, "skip_connect").unwrap().build(16, 32, 2, true).unwrap();
    assert!(matches!(skip, Op::FactorizedReduce(_)));
    assert_eq!(skip.forward(&x).shape, vec![2, 32, 16, 16]);

    let none = lookup(Catalog::Primary, "none").unwrap().build(16, 32, 2, true).unwrap();
    let z = none.forward(&x);
    assert_eq!(z.shape, vec![2, 16, 16, 16]);
    assert!(z.is_all_zero());
}

#[test]
fn test_skip_connect_variants_per_catalog() {
    let primary = lookup(Catalog::Primary, "skip_connect").unwrap();
    let legacy = lookup(Catalog::Legacy, "skip_connect").unwrap();

    assert!(matches!(primary.build(8, 8, 1, true).unwrap(), Op::Identity(_)));
    assert!(matches!(legacy.build(8, 8, 1, true).unwrap(), Op::Identity(_)));
    assert!(matches!(primary.build(8, 8, 2, true).unwrap(), Op::FactorizedReduce(_)));
    assert!(matches!(legacy.build(8, 8, 2, true).unwrap(), Op::ReluConvBn(_)));

    let err = primary.build(8, 16, 1, true).unwrap_err();
    assert!(matches!(err, OpError::InvalidChannelConfig { op: "identity", .. }));
}

#[test]
fn test_assembly_rejects_catalog_switch() {
    let mut net = Assembly::new();
    assert_eq!(net.catalog(), None);

    // a failed lookup does not bind the network
    assert!(net.build(Catalog::Legacy, "bogus", 8, 8, 1, true).is_err());
    assert_eq!(net.catalog(), None);

    net.build(Catalog::Primary, "sep_conv_3x3", 8, 8, 1, true).unwrap();
    net.build(Catalog::Primary, "skip_connect", 8, 8, 2, false).unwrap();
    assert_eq!(net.catalog(), Some(Catalog::Primary));
    assert_eq!(net.built(), 2);

    let err = net.build(Catalog::Legacy, "sep_conv_3x3", 8, 8, 1, true).unwrap_err();
    assert_eq!(err, OpError::CatalogMismatch { bound: "primary", requested: "legacy" });
    assert_eq!(net.built(), 2);
}

#[test]
fn test_assembly_counts_parameters() {
    let mut net = Assembly::bound_to(Catalog::Primary);
    let reduce = net.build(Catalog::Primary, "skip_connect", 16, 32, 2, true).unwrap();
    // two 1x1 paths of 16 -> 16 plus affine batch norm over 32 channels
    assert_eq!(reduce.param_count(), 2 * 16 * 16 + 2 * 32);
    net.build(Catalog::Primary, "none", 16, 16, 1, true).unwrap();
    assert_eq!(net.param_count(), 576);
    assert!((net.param_count_millions() - 0.000_576).abs() < 1e-12);
}

#[test]
fn test_catalog_names_parse() {
    assert_eq!("primary".parse::<Catalog>().unwrap(), Catalog::Primary);
    assert_eq!("DARTS_OPS".parse::<Catalog>().unwrap(), Catalog::Legacy);
    assert!(matches!("pnas".parse::<Catalog>(), Err(OpError::UnknownCatalog(_))));
    assert_eq!(Catalog::Legacy.to_string(), "legacy");
}

#[test]
fn test_macs_of_legacy_reprojection() {
    let op = lookup(Catalog::Legacy, "skip_connect").unwrap().build(4, 4, 2, true).unwrap();
    let input = Shape4::new(1, 4, 8, 8);
    // 1x1 conv: 64 outputs x 4 inputs each, then one multiply-add per output for bn
    assert_eq!(op.macs(input), 64 * 4 + 64);
    assert_eq!(lookup(Catalog::Legacy, "none").unwrap().build(4, 4, 2, true).unwrap().macs(input), 0);
}
