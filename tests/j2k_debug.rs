//! End-to-end integration tests: encode a synthetic image in memory, then
//! decode it back and inspect the reconstructed tile/tree structure.

use j2k_core::jpeg2000::decoder::J2kDecoder;
use j2k_core::jpeg2000::encoder::{J2kEncoder, SourceComponent, SourceImage};
use j2k_core::options::{DecodeOptions, EncodeOptions};

fn gradient_image(width: u32, height: u32) -> SourceImage {
    let samples: Vec<i32> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x + y) as i32))
        .map(|v| v % 256)
        .collect();
    SourceImage {
        width,
        height,
        components: vec![SourceComponent {
            precision: 8,
            is_signed: false,
            dx: 1,
            dy: 1,
            samples,
        }],
    }
}

#[test]
fn lossless_single_resolution_round_trips_exactly() {
    let image = gradient_image(64, 64);
    let options = EncodeOptions {
        num_resolutions: 1,
        codeblock_width: 32,
        codeblock_height: 32,
        ..EncodeOptions::default()
    };

    let encoder = J2kEncoder::new(options);
    let mut buffer = vec![0u8; 64 * 1024];
    let len = encoder.encode(&image, &mut buffer).expect("encode failed");
    println!("Encoded {len} bytes for a 64x64 gradient");

    let (decoded, diagnostics) = J2kDecoder::new(&buffer[..len])
        .decode(&DecodeOptions::default())
        .expect("decode failed");
    assert!(diagnostics.is_empty(), "unexpected warnings: {:?}", diagnostics.warnings());

    let tile = &decoded.tiles[0];
    assert_eq!(tile.components.len(), 1);
    let comp = &tile.components[0];
    assert_eq!(comp.resolutions.len(), 1);

    let expected = &image.components[0].samples;
    assert_eq!(&comp.data, expected);

    let mae: f64 = comp
        .data
        .iter()
        .zip(expected.iter())
        .map(|(&a, &b)| (a - b).unsigned_abs() as f64)
        .sum::<f64>()
        / comp.data.len() as f64;
    assert_eq!(mae, 0.0, "lossless round trip must have zero mean absolute error");
}

#[test]
fn lossless_multi_resolution_round_trips_exactly() {
    let image = gradient_image(64, 64);
    let options = EncodeOptions {
        num_resolutions: 3,
        codeblock_width: 32,
        codeblock_height: 32,
        ..EncodeOptions::default()
    };

    let encoder = J2kEncoder::new(options);
    let mut buffer = vec![0u8; 64 * 1024];
    let len = encoder.encode(&image, &mut buffer).expect("encode failed");

    let (decoded, _diagnostics) = J2kDecoder::new(&buffer[..len])
        .decode(&DecodeOptions::default())
        .expect("decode failed");

    let tile = &decoded.tiles[0];
    let comp = &tile.components[0];
    assert_eq!(comp.resolutions.len(), 3);

    for (ri, res) in comp.resolutions.iter().enumerate() {
        let expected_subbands = if ri == 0 { 1 } else { 3 };
        assert_eq!(res.subbands.len(), expected_subbands, "resolution {ri} subband count");
    }

    assert_eq!(&comp.data, &image.components[0].samples);
}

#[test]
fn three_component_rct_round_trips_exactly() {
    let width = 16;
    let height = 16;
    let plane = |seed: i32| -> Vec<i32> {
        (0..(width * height) as i32).map(|v| (v * seed) % 256).collect()
    };
    let image = SourceImage {
        width,
        height,
        components: vec![
            SourceComponent { precision: 8, is_signed: false, dx: 1, dy: 1, samples: plane(3) },
            SourceComponent { precision: 8, is_signed: false, dx: 1, dy: 1, samples: plane(5) },
            SourceComponent { precision: 8, is_signed: false, dx: 1, dy: 1, samples: plane(7) },
        ],
    };
    let options = EncodeOptions {
        num_resolutions: 2,
        codeblock_width: 16,
        codeblock_height: 16,
        mct: 1,
        ..EncodeOptions::default()
    };

    let encoder = J2kEncoder::new(options);
    let mut buffer = vec![0u8; 64 * 1024];
    let len = encoder.encode(&image, &mut buffer).expect("encode failed");

    let (decoded, _diagnostics) = J2kDecoder::new(&buffer[..len])
        .decode(&DecodeOptions::default())
        .expect("decode failed");

    let tile = &decoded.tiles[0];
    assert_eq!(tile.components.len(), 3);
    for (c, comp) in tile.components.iter().enumerate() {
        assert_eq!(comp.data, image.components[c].samples, "component {c} mismatch");
    }
}
