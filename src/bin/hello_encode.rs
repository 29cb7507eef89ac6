//! hello-encode - encode a raw frame file and optionally write a statistics report.
//!
//! Usage:
//!   hello-encode -i <input> -w <width> -h <height> [options]
//!
//! Options:
//!   -i, --input <file>          Raw input file of concatenated frames
//!   -o, --output <file>         Encoded output (default: input with codec extension)
//!   -w, --width <px>            Frame width
//!   -h, --height <px>           Frame height
//!   -r, --rate <fps>            Frame rate (default: 30)
//!   -c, --codec-type <name>     avc, hevc, mpeg2, vc1, capture, vp9, av1 (default: hevc)
//!   --color-format <name>       Input layout (default: i420 software, nv12 hardware)
//!   --chroma-format <name>      Chroma subsampling (default: yuv420)
//!   --bitrate-mode <name>       Rate control method (default: cqp)
//!   --bitrate <kbps>            Target bitrate
//!   --gop <frames>              Key frame distance
//!   --use-hw                    Use a hardware implementation
//!   --stats <file>              Write the JSON statistics report
//!   --config <file>             Load settings from JSON (flags override)
//!
//! Exit codes follow errno: EINVAL for bad configuration, ENOENT for missing
//! files, EIO for write and encoder failures.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use vplenc::{run, CliArgs, EncodeConfig};

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vplenc=info".parse()?)
                .add_directive("vplenc_codec=info".parse()?)
                .add_directive("hello_encode=info".parse()?),
        )
        .init();
    Ok(())
}

fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("Failed to set up logging: {e}");
    }

    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(libc::EINVAL);
        }
    };

    let outcome = EncodeConfig::from_args(args).and_then(|config| run(&config));
    match outcome {
        Ok(outcome) => {
            println!(
                "Encoded {} frames ({} bytes) in {} ms",
                outcome.frames, outcome.bytes, outcome.proctime
            );
            println!("Output:     {}", outcome.output_path.display());
            if let Some(report) = &outcome.report_path {
                println!("Statistics: {}", report.display());
            }
        }
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
