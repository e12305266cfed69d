use std::io::Write;

use clap::Parser;
use log::{info, LevelFilter};
use qrgif::qrcode::{QrCode, QrCodeEcc, Version};
use qrgif::segment::QrSegmentMode;
use qrgif::text::TextEncoding;

/// Encode text as a QR Code and print it as a GIF data URL.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Text to encode
    text: String,

    /// Symbol version (1-40); no larger version is tried when the text does not fit
    #[arg(short = 's', long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=40))]
    symbol_version: u8,

    /// Error correction level (L, M, Q or H)
    #[arg(short, long, default_value = "L")]
    ecc: QrCodeEcc,

    /// Segment mode (numeric, alphanumeric, byte or kanji)
    #[arg(short, long, default_value = "byte")]
    mode: QrSegmentMode,

    /// Byte-mode text encoding (utf-8 or shift_jis); kanji mode always uses Shift_JIS
    #[arg(long, default_value = "utf-8")]
    encoding: TextEncoding,

    /// Pixels per module
    #[arg(short, long)]
    cell_size: Option<u32>,

    /// Quiet zone in pixels (defaults to four cells)
    #[arg(long)]
    margin: Option<u32>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let mut qr = QrCode::new();
    qr.set_version(Version::try_from(cli.symbol_version)?);
    qr.set_error_correction_level(cli.ecc);
    qr.set_text_encoding(cli.encoding);
    qr.add_text(&cli.text, Some(cli.mode))?;
    qr.build()?;
    info!(
        "built version {} symbol, {} modules",
        qr.version().value(),
        qr.module_count()
    );

    let url = qr.to_data_url(cli.cell_size, cli.margin)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", url)?;
    Ok(())
}
