/*!
# jpegexp-rs

A pure Rust codec core for JPEG 2000 (ISO/IEC 15444-1) and its High
Throughput extension, HTJ2K (ISO/IEC 15444-15).

## Scope

- **Tier-1**: MQ-coded EBCOT bit-plane coding (Part-1) and the HT
  MEL/MagSgn/VLC block coder (Part-15, decode direction).
- **Tier-2**: tag-tree-coded packet headers, the five progression orders.
- **Codestream**: marker-driven parsing and writing of main/tile headers
  (SOC, SIZ, CAP, COD, QCD, SOT, SOD, EOC) and the JP2 container's box
  structure.
- **Transforms**: reversible 5/3 and irreversible 9/7 DWT, reversible and
  irreversible multi-component transforms (RCT/ICT).
- **Concurrency**: a bounded thread pool (`scheduler`) driving per-tile
  task graphs and independent per-tile work.

## Safety
Written in pure Rust; no `unsafe` blocks appear in this crate's own code.
*/

pub mod buffer;
pub mod coding_parameters;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod jpeg2000;
pub mod marker;
pub mod mct;
pub mod options;
pub mod scheduler;
pub mod stream;

pub use diagnostics::Diagnostics;
pub use error::{CodecError, CodecResult};
pub use jpeg2000::decoder::J2kDecoder;
pub use jpeg2000::encoder::{J2kEncoder, SourceComponent, SourceImage};
pub use jpeg2000::image::J2kImage;
pub use options::{DecodeOptions, EncodeOptions};

/// Decodes a complete JPEG 2000 or HTJ2K code-stream (or a JP2 container
/// wrapping one) held entirely in memory.
pub fn decode(data: &[u8], options: &DecodeOptions) -> CodecResult<(J2kImage, Diagnostics)> {
    J2kDecoder::new(data).decode(options)
}

/// Compresses `image` into `destination`, returning the number of bytes
/// written. See [`J2kEncoder::encode`].
pub fn compress(image: &SourceImage, options: EncodeOptions, destination: &mut [u8]) -> CodecResult<usize> {
    J2kEncoder::new(options).encode(image, destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_small_synthetic_image() {
        let width = 8;
        let height = 8;
        let samples: Vec<i32> = (0..(width * height) as i32).map(|v| (v * 29) % 256).collect();
        let image = SourceImage {
            width,
            height,
            components: vec![SourceComponent {
                precision: 8,
                is_signed: false,
                dx: 1,
                dy: 1,
                samples: samples.clone(),
            }],
        };
        let options = EncodeOptions {
            num_resolutions: 1,
            codeblock_width: 64,
            codeblock_height: 64,
            ..EncodeOptions::default()
        };

        let mut buffer = vec![0u8; 4096];
        let len = compress(&image, options, &mut buffer).unwrap();

        let (decoded, _diagnostics) = decode(&buffer[..len], &DecodeOptions::default()).unwrap();
        assert_eq!(decoded.tiles[0].components[0].data, samples);
    }
}
