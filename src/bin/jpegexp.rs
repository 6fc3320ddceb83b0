//! jpegexp CLI - JPEG 2000 / HTJ2K codec command-line utility.

use clap::{Parser, Subcommand, ValueEnum};
use j2k_core::jpeg2000::encoder::{SourceComponent, SourceImage};
use j2k_core::options::{DecodeOptions, EncodeOptions};
use std::fs;
use std::path::PathBuf;

/// JPEG 2000 / HTJ2K codec: encode, decode, and inspect code-streams.
#[derive(Parser)]
#[command(name = "jpegexp")]
#[command(author = "jpegexp-rs contributors")]
#[command(version)]
#[command(about = "JPEG 2000 / HTJ2K codec for encoding, decoding, and inspection", long_about = None)]
#[command(after_help = "EXAMPLES:
    jpegexp decode -i image.j2k -o pixels.raw
    jpegexp decode -i image.j2k -o image.ppm -f ppm
    jpegexp encode -i pixels.raw -o image.j2k -w 512 -H 512 -n 1
    jpegexp info -i image.j2k")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a JPEG 2000 / HTJ2K code-stream (or JP2 container) to raw
    /// pixels or PPM/PGM
    #[command(visible_alias = "d")]
    Decode {
        #[arg(short, long, help = "Path to the input .j2k/.jp2/.jph file")]
        input: PathBuf,
        #[arg(short, long, help = "Path for the output file")]
        output: PathBuf,
        #[arg(short, long, default_value = "raw", value_enum)]
        format: OutputFormat,
        /// Decode at a reduced resolution (0 = full resolution)
        #[arg(short, long, default_value = "0")]
        reduce: u8,
    },

    /// Encode raw 8-bit planar pixels into a JPEG 2000 code-stream
    #[command(visible_alias = "e")]
    Encode {
        #[arg(short, long, help = "Path to raw pixel data file")]
        input: PathBuf,
        #[arg(short, long, help = "Path for the encoded .j2k output file")]
        output: PathBuf,
        #[arg(short, long)]
        width: u32,
        #[arg(short = 'H', long)]
        height: u32,
        /// Number of color components (1 = grayscale, 3 = RGB)
        #[arg(short = 'n', long, default_value = "1")]
        components: u32,
        /// Number of wavelet decomposition resolutions
        #[arg(short = 'r', long, default_value = "6")]
        resolutions: u8,
        /// Enable the reversible colour transform (components == 3 only)
        #[arg(long)]
        mct: bool,
        /// Encode losslessly with the reversible 5/3 wavelet (default).
        /// Pass a compression ratio (e.g. 20.0) to encode lossily instead.
        #[arg(long)]
        ratio: Option<f32>,
        /// Target bitstream format
        #[arg(short = 'c', long, default_value = "j2k", value_enum)]
        codec: Codec,
    },

    /// Display code-stream metadata
    #[command(visible_alias = "i")]
    Info {
        #[arg(short, long, help = "Path to the image file to inspect")]
        input: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Raw,
    Ppm,
}

#[derive(Clone, Debug, ValueEnum)]
enum Codec {
    J2k,
    Htj2k,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Decode { input, output, format, reduce } => decode_image(&input, &output, &format, reduce),
        Commands::Encode {
            input,
            output,
            width,
            height,
            components,
            resolutions,
            mct,
            ratio,
            codec,
        } => encode_image(&input, &output, width, height, components, resolutions, mct, ratio, &codec),
        Commands::Info { input } => show_info(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn decode_image(
    input: &PathBuf,
    output: &PathBuf,
    format: &OutputFormat,
    reduce: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let options = DecodeOptions { reduce, ..DecodeOptions::default() };
    let (image, diagnostics) = j2k_core::decode(&data, &options)?;

    let tile = image.tiles.first().ok_or("code-stream has no tiles")?;
    let width = tile.rect.width();
    let height = tile.rect.height();
    let num_components = tile.components.len() as u32;

    let pixels: Vec<u8> = tile
        .components
        .iter()
        .flat_map(|c| c.data.iter().map(|&v| v.clamp(0, 255) as u8))
        .collect();

    match format {
        OutputFormat::Raw => fs::write(output, &pixels)?,
        OutputFormat::Ppm => write_ppm(output, &pixels, width, height, num_components)?,
    }

    for warning in diagnostics.warnings() {
        eprintln!("warning: {}: {}", warning.kind, warning.detail);
    }
    println!("Decoded {width}x{height} image ({num_components} components) to {output:?}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn encode_image(
    input: &PathBuf,
    output: &PathBuf,
    width: u32,
    height: u32,
    components: u32,
    resolutions: u8,
    mct: bool,
    ratio: Option<f32>,
    codec: &Codec,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = fs::read(input)?;
    let plane_size = (width * height) as usize;
    if raw.len() < plane_size * components as usize {
        return Err("input file is smaller than width * height * components".into());
    }

    let source_components = (0..components as usize)
        .map(|c| SourceComponent {
            precision: 8,
            is_signed: false,
            dx: 1,
            dy: 1,
            samples: raw[c * plane_size..(c + 1) * plane_size].iter().map(|&b| b as i32).collect(),
        })
        .collect();

    let image = SourceImage { width, height, components: source_components };

    let cblk_sty = match codec {
        Codec::J2k => 0,
        Codec::Htj2k => j2k_core::constants::cblk_sty::HT_ONLY,
    };
    let options = EncodeOptions {
        num_resolutions: resolutions,
        mct: if mct { 1 } else { 0 },
        cblk_sty,
        rate_control: ratio.map(|r| j2k_core::options::RateControl::CompressionRatios(vec![r])),
        ..EncodeOptions::default()
    };

    let mut buffer = vec![0u8; raw.len() * 2 + 4096];
    let len = j2k_core::compress(&image, options, &mut buffer)?;
    fs::write(output, &buffer[..len])?;

    println!("Encoded {width}x{height} image to {output:?} ({len} bytes)");
    Ok(())
}

fn show_info(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    println!("File: {input:?}");
    println!("Size: {} bytes", data.len());
    println!();

    let (image, _diagnostics) = j2k_core::decode(&data, &DecodeOptions::default())?;
    let params = &image.params;

    println!("Format: {}", if image.icc_profile.is_some() { "JP2 Container" } else { "JPEG 2000 Codestream" });
    println!("  Dimensions:  {}x{}", params.image_x1 - params.image_x0, params.image_y1 - params.image_y0);
    println!("  Components:  {}", params.components.len());
    println!("  Tile size:   {}x{}", params.tile_width, params.tile_height);
    println!("  HTJ2K:       {}", if params.is_htj2k() { "yes" } else { "no" });

    if let Some(tile) = params.tiles.first() {
        println!("  Layers:      {}", tile.num_layers);
        println!(
            "  Progression: {}",
            match tile.progression_order {
                0 => "LRCP",
                1 => "RLCP",
                2 => "RPCL",
                3 => "PCRL",
                4 => "CPRL",
                _ => "unknown",
            }
        );
        if let Some(tccp) = tile.components.first() {
            println!("  Resolutions: {}", tccp.num_resolutions);
            println!("  Wavelet:     {}", if tccp.wavelet_id == 1 { "5/3 reversible" } else { "9/7 irreversible" });
        }
    }

    Ok(())
}

fn write_ppm(
    path: &PathBuf,
    pixels: &[u8],
    width: u32,
    height: u32,
    components: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::io::Write;
    let mut file = fs::File::create(path)?;

    if components == 1 {
        writeln!(file, "P5")?;
    } else {
        writeln!(file, "P6")?;
    }
    writeln!(file, "{width} {height}")?;
    writeln!(file, "255")?;
    file.write_all(pixels)?;

    Ok(())
}
