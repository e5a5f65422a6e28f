//! Integration tests: direct and tiled engines must agree bit for bit

use tilecheck_model::harness::{verify_layer, LayerData, DEFAULT_VALUE_RANGE};
use tilecheck_model::{
    ConvEngine, DirectEngine, EquivalenceChecker, LayerParams, MacEvent, Ofmap, Tensor,
    TileError, TiledEngine, TilingConfig, TraceWriter, ZooLayer,
};

fn layer(
    oy: (i64, i64),
    ox: (i64, i64),
    oc: (i64, i64),
    ic: (i64, i64),
    fy: i64,
    fx: i64,
    stride: i64,
) -> TilingConfig {
    TilingConfig::new(LayerParams {
        oy1: oy.0,
        oy0: oy.1,
        ox1: ox.0,
        ox0: ox.1,
        oc1: oc.0,
        oc0: oc.1,
        ic1: ic.0,
        ic0: ic.1,
        fy,
        fx,
        stride,
    })
    .expect("valid test layer")
}

fn both(cfg: &TilingConfig, data: &LayerData) -> (Ofmap, Ofmap) {
    let direct = DirectEngine::new()
        .convolve(cfg, &data.ifmap, &data.weights)
        .expect("direct engine failed");
    let tiled = TiledEngine::new()
        .convolve(cfg, &data.ifmap, &data.weights)
        .expect("tiled engine failed");
    (direct, tiled)
}

/// 1×1 output, two input and two output channels
#[test]
fn test_concrete_channel_mix() {
    let cfg = layer((1, 1), (1, 1), (1, 2), (1, 2), 1, 1, 1);
    let data = LayerData {
        ifmap: Tensor::from_vec([1, 1, 2], vec![1, 2]).unwrap(),
        weights: Tensor::from_vec([1, 1, 2, 2], vec![3, 4, 5, 6]).unwrap(),
    };
    let (direct, tiled) = both(&cfg, &data);
    assert_eq!(direct.as_slice(), &[13, 16]);
    assert_eq!(tiled.as_slice(), &[13, 16]);
}

/// Every zoo layer small enough for a debug-build test run
#[test]
fn test_zoo_layers_match() {
    for preset in [ZooLayer::Small, ZooLayer::ResnetFc] {
        let cfg = preset.config().unwrap();
        let data = LayerData::random(&cfg, 0xC0FFEE, DEFAULT_VALUE_RANGE).unwrap();
        let verdict = verify_layer(
            &cfg,
            &data.ifmap,
            &data.weights,
            &DirectEngine::new(),
            &TiledEngine::new(),
        )
        .unwrap();
        assert!(verdict.is_pass(), "{preset}: {}", verdict.report);
    }
}

#[test]
fn test_zero_filter_gives_zero_ofmap() {
    let cfg = ZooLayer::Small.config().unwrap();
    let mut data = LayerData::random(&cfg, 11, -500..500).unwrap();
    data.weights.fill(0);
    let (direct, tiled) = both(&cfg, &data);
    assert!(direct.as_slice().iter().all(|&v| v == 0));
    assert_eq!(direct, tiled);
}

/// 1×1 filter, one channel in and out: output is a strided, scaled copy
#[test]
fn test_single_tap_scales_strided_input() {
    let cfg = layer((2, 2), (3, 1), (1, 1), (1, 1), 1, 1, 2);
    let ifmap = Tensor::from_fn(cfg.shape().ifmap_extents(), |[y, x, _]| {
        (y * 10 + x) as i16
    })
    .unwrap();
    let weights = Tensor::from_vec([1, 1, 1, 1], vec![-3]).unwrap();
    let data = LayerData { ifmap, weights };
    let (direct, tiled) = both(&cfg, &data);
    for [oy, ox, oc] in direct.indices() {
        let expected = -3 * i32::from(data.ifmap[[2 * oy, 2 * ox, 0]]);
        assert_eq!(direct[[oy, ox, oc]], expected);
    }
    assert_eq!(direct, tiled);
}

/// Sums past i32::MAX wrap identically in both engines
#[test]
fn test_accumulator_wraparound() {
    // Two products of 2^30 sum to exactly 2^31
    let cfg = layer((1, 1), (1, 1), (1, 1), (1, 2), 1, 1, 1);
    let data = LayerData {
        ifmap: Tensor::from_vec([1, 1, 2], vec![i16::MIN, i16::MIN]).unwrap(),
        weights: Tensor::from_vec([1, 1, 2, 1], vec![i16::MIN, i16::MIN]).unwrap(),
    };
    let (direct, tiled) = both(&cfg, &data);
    assert_eq!(direct.as_slice(), &[i32::MIN]);
    assert_eq!(tiled.as_slice(), &[i32::MIN]);

    // Tiled across IC1 and the filter window as well
    let cfg = layer((1, 1), (1, 1), (1, 1), (3, 1), 2, 1, 1);
    let data = LayerData {
        ifmap: Tensor::from_fn([2, 1, 3], |_| i16::MAX).unwrap(),
        weights: Tensor::from_fn([2, 1, 3, 1], |_| i16::MAX).unwrap(),
    };
    let (direct, tiled) = both(&cfg, &data);
    #[allow(clippy::cast_possible_truncation)]
    let wrapped = (6 * i64::from(i16::MAX) * i64::from(i16::MAX)) as i32;
    assert_eq!(direct.as_slice(), &[wrapped]);
    assert_eq!(direct, tiled);
}

#[test]
fn test_malformed_config_rejected_before_compute() {
    let json = r#"{"OY1":1,"OY0":1,"OX1":1,"OX0":1,"OC1":1,"OC0":0,
                   "IC1":1,"IC0":1,"FY":1,"FX":1,"STRIDE":1}"#;
    let err = TilingConfig::from_json_str(json).unwrap_err();
    assert!(err.is_config_error());

    // Ifmap one row short of the receptive field
    let cfg = layer((2, 1), (1, 1), (1, 1), (1, 1), 3, 1, 1);
    let ifmap = Tensor::zeros([3, 1, 1]).unwrap();
    let weights = Tensor::zeros([3, 1, 1, 1]).unwrap();
    for engine in [&DirectEngine::new() as &dyn ConvEngine, &TiledEngine::new()] {
        let err = engine.convolve(&cfg, &ifmap, &weights).unwrap_err();
        assert!(
            matches!(err, TileError::ShapeMismatch { operand: "ifmap", .. }),
            "{}: {err}",
            engine.kind()
        );
    }
}

#[test]
fn test_checker_reports_injected_fault() {
    let cfg = ZooLayer::Small.config().unwrap();
    let data = LayerData::random(&cfg, 5, DEFAULT_VALUE_RANGE).unwrap();
    let (direct, mut tiled) = both(&cfg, &data);
    tiled[[11, 0, 15]] ^= 1 << 20;
    let report = EquivalenceChecker::new().compare(&direct, &tiled).unwrap();
    assert!(!report.is_pass());
    assert_eq!(report.mismatch_count, 1);
    assert_eq!(report.mismatches[0].index, vec![11, 0, 15]);
}

#[test]
fn test_trace_covers_every_mac() {
    let cfg = layer((2, 2), (1, 2), (2, 2), (2, 1), 2, 2, 1);
    let data = LayerData::random(&cfg, 9, DEFAULT_VALUE_RANGE).unwrap();

    let mut events: Vec<MacEvent> = Vec::new();
    let traced = TiledEngine::new()
        .convolve_traced(&cfg, &data.ifmap, &data.weights, &mut events)
        .unwrap();
    assert_eq!(events.len() as u64, cfg.shape().macs());

    // The last event touching each element carries its final value
    let mut last = Tensor::<i32, 3>::zeros(cfg.shape().ofmap_extents()).unwrap();
    for e in &events {
        assert_eq!(e.ofmap_out, e.ofmap_in.wrapping_add(i32::from(e.ifmap) * i32::from(e.weight)));
        last[e.index] = e.ofmap_out;
    }
    assert_eq!(last, traced);

    let mut writer = TraceWriter::new(Vec::new());
    let again = TiledEngine::new()
        .convolve_traced(&cfg, &data.ifmap, &data.weights, &mut writer)
        .unwrap();
    assert_eq!(again, traced);
    let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
    assert_eq!(text.lines().count(), events.len());
    assert!(text.starts_with("ic0 = 0, oc0 = 0, ifmap = "));
}
