use clap::{Parser, Subcommand};
use playback_client::load;
use playback_client::playback_types::PlaybackOptions;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Decode a video on a hardware accelerator and show it in a window.
    Play {
        input: String,
        /// Accelerator type, e.g. cuda, vaapi, videotoolbox.
        #[arg(long, default_value = "cuda")]
        device: String,
        /// Delay after every presented frame.
        #[arg(long, default_value_t = 40)]
        interval_ms: u32,
        #[arg(long, short)]
        verbose: bool,
    },
    /// List the accelerator types this FFmpeg build supports.
    Devices,
}

#[derive(Parser)]
#[command(name = "hwplay", about = "Hardware accelerated video player")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn library_path() -> PathBuf {
    let lib_name = if cfg!(target_os = "windows") {
        "playback_lib.dll"
    } else if cfg!(target_os = "macos") {
        "libplayback_lib.dylib"
    } else {
        "libplayback_lib.so"
    };

    let default_lib_path = PathBuf::from("./target/debug").join(lib_name);
    env::var("PLAYBACK_LIB_PATH")
        .map(PathBuf::from)
        .unwrap_or(default_lib_path)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let lib_path = library_path();
    let client = match load(&lib_path) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to load {}: {}", lib_path.display(), e);
            return exit_code(e.exit_code());
        }
    };

    match cli.command {
        Command::Play {
            input,
            device,
            interval_ms,
            verbose,
        } => {
            client.init_logging(verbose);
            println!("Playing {} on {}", input, device);

            let options = PlaybackOptions {
                device_type: device.as_str().into(),
                frame_interval_ms: interval_ms,
                verbose,
            };
            match client.play(&input, options) {
                Ok(summary) => {
                    println!(
                        "{} packets, {} frames decoded, {} transferred, {} presented{}",
                        summary.packets_submitted,
                        summary.frames_received,
                        summary.frames_transferred,
                        summary.frames_presented,
                        if summary.cancelled { " (window closed)" } else { "" }
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}", e);
                    exit_code(e.exit_code())
                }
            }
        }
        Command::Devices => {
            client.init_logging(false);
            let devices = client.list_hw_devices();
            if devices.is_empty() {
                println!("No hardware device types available");
            }
            for device in devices {
                println!("{}", device);
            }
            ExitCode::SUCCESS
        }
    }
}
