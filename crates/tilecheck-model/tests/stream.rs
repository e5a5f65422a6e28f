//! Integration tests for the stream codec and on-disk artifacts

use tempfile::TempDir;
use tilecheck_model::harness::{LayerData, StreamArtifacts, DEFAULT_VALUE_RANGE};
use tilecheck_model::stream::{ifmap_fully_streamed, Overflow, TokenFormat};
use tilecheck_model::{
    ConvEngine, DirectEngine, EquivalenceChecker, LayerParams, StreamCodec, StreamKind, TileError,
    TilingConfig, ZooLayer,
};

fn text(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes).expect("streams are ASCII")
}

fn strided(stride: i64, f: i64) -> TilingConfig {
    TilingConfig::new(LayerParams {
        oy1: 2,
        oy0: 2,
        ox1: 1,
        ox0: 3,
        oc1: 1,
        oc0: 2,
        ic1: 1,
        ic0: 2,
        fy: f,
        fx: f,
        stride,
    })
    .expect("valid test layer")
}

#[test]
fn test_round_trip_all_streams() {
    let cfg = ZooLayer::Small.config().unwrap();
    let codec = StreamCodec::new(cfg);
    let data = LayerData::random(&cfg, 21, -300..300).unwrap();
    let ofmap = DirectEngine::new()
        .convolve(&cfg, &data.ifmap, &data.weights)
        .unwrap();

    let ifmap_text = codec.encode_ifmap(&data.ifmap).unwrap();
    let weight_text = codec.encode_weights(&data.weights).unwrap();
    let ofmap_text = codec.encode_ofmap(&ofmap).unwrap();

    assert_eq!(codec.decode_ifmap(text(&ifmap_text)).unwrap(), data.ifmap);
    assert_eq!(codec.decode_weights(text(&weight_text)).unwrap(), data.weights);
    assert_eq!(codec.decode_ofmap(text(&ofmap_text)).unwrap(), ofmap);
}

#[test]
fn test_token_counts_for_small_layer() {
    let cfg = ZooLayer::Small.config().unwrap();
    // OY1*OX1*IC1 * (S*(OY0-1)+FY) * (S*(OX0-1)+FX) * IC0 = 4*4*2 * 5*5 * 4
    assert_eq!(StreamKind::Ifmap.token_count(&cfg), 3200);
    // OC1*IC1*FY*FX*IC0*OC0 = 4*2*3*3*4*4
    assert_eq!(StreamKind::Weights.token_count(&cfg), 1152);
    // OY*OX*OC
    assert_eq!(StreamKind::Ofmap.token_count(&cfg), 12 * 12 * 16);

    let codec = StreamCodec::new(cfg);
    let data = LayerData::random(&cfg, 2, DEFAULT_VALUE_RANGE).unwrap();
    let encoded = codec.encode_ifmap(&data.ifmap).unwrap();
    assert_eq!(text(&encoded).lines().count(), 3200);
    assert!(text(&encoded).lines().all(|l| l.len() == 4));
}

#[test]
fn test_truncated_stream_rejected() {
    let cfg = ZooLayer::Small.config().unwrap();
    let codec = StreamCodec::new(cfg);
    let data = LayerData::random(&cfg, 2, DEFAULT_VALUE_RANGE).unwrap();
    let encoded = codec.encode_weights(&data.weights).unwrap();
    let short: Vec<&str> = text(&encoded).lines().skip(1).collect();
    let err = codec.decode_weights(&short.join("\n")).unwrap_err();
    assert!(matches!(
        err,
        TileError::TokenCount {
            expected: 1152,
            actual: 1151,
            ..
        }
    ));
}

#[test]
fn test_bad_token_reports_line() {
    let cfg = strided(1, 1);
    let codec = StreamCodec::new(cfg);
    let count = StreamKind::Ofmap.token_count(&cfg) as usize;
    let mut lines = vec!["00000000"; count];
    lines[4] = "0000000g";
    let err = codec.decode_ofmap(&lines.join("\n")).unwrap_err();
    assert!(matches!(err, TileError::Token { line: 5, .. }), "{err}");
}

#[test]
fn test_uncovered_ifmap_positions_decode_as_zero() {
    // Stride 3 with a 2x2 filter: the two row tiles leave row 5 unstreamed
    let cfg = strided(3, 2);
    assert!(!ifmap_fully_streamed(&cfg));
    let codec = StreamCodec::new(cfg);
    let data = LayerData::random(&cfg, 4, 1..50).unwrap();

    let decoded = codec
        .decode_ifmap(text(&codec.encode_ifmap(&data.ifmap).unwrap()))
        .unwrap();
    for [y, x, c] in decoded.indices() {
        let covered = y % (3 * 2) < cfg.tile_iy();
        let expected = if covered { data.ifmap[[y, x, c]] } else { 0 };
        assert_eq!(decoded[[y, x, c]], expected, "[{y}, {x}, {c}]");
    }

    // Skipped positions never reach a MAC, so the output is unchanged
    let direct = DirectEngine::new();
    let original = direct.convolve(&cfg, &data.ifmap, &data.weights).unwrap();
    let reloaded = direct.convolve(&cfg, &decoded, &data.weights).unwrap();
    assert!(EquivalenceChecker::new()
        .compare(&original, &reloaded)
        .unwrap()
        .is_pass());
}

#[test]
fn test_interface_width_ofmap_truncation() {
    let cfg = strided(1, 2);
    let data = LayerData::random(&cfg, 8, DEFAULT_VALUE_RANGE).unwrap();
    let ofmap = DirectEngine::new()
        .convolve(&cfg, &data.ifmap, &data.weights)
        .unwrap();

    let codec = StreamCodec::for_interface(cfg);
    assert_eq!(codec.format(StreamKind::Ofmap).overflow(), Overflow::Truncate);
    let decoded = codec
        .decode_ofmap(text(&codec.encode_ofmap(&ofmap).unwrap()))
        .unwrap();
    for idx in ofmap.indices() {
        #[allow(clippy::cast_possible_truncation)]
        let low = i32::from(ofmap[idx] as i16);
        assert_eq!(decoded[idx], low);
    }

    let strict = codec.with_format(StreamKind::Ofmap, TokenFormat::new(16).unwrap());
    let wide = ofmap.as_slice().iter().any(|&v| i16::try_from(v).is_err());
    assert_eq!(strict.encode_ofmap(&ofmap).is_err(), wide);
}

#[test]
fn test_artifact_files() {
    let dir = TempDir::new().unwrap();
    let cfg = ZooLayer::Small.config().unwrap();
    let artifacts = StreamArtifacts::new(dir.path(), StreamCodec::new(cfg));
    let data = LayerData::random(&cfg, 99, DEFAULT_VALUE_RANGE).unwrap();
    artifacts.write_inputs(&data).unwrap();

    for kind in [StreamKind::Ifmap, StreamKind::Weights] {
        let body = std::fs::read_to_string(artifacts.path(kind)).unwrap();
        assert_eq!(body.lines().count() as u64, kind.token_count(&cfg), "{kind}");
    }
    assert!(dir.path().join("ifmap_data.txt").exists());
    assert!(dir.path().join("weight_data.txt").exists());
    assert_eq!(artifacts.read_inputs().unwrap(), data);
}
