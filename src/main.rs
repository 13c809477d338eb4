use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use indicatif::{ProgressBar, ProgressStyle};
use posecheck::{
    checker::{decode_image, PhotoChecker},
    config::{CheckerConfig, PollConfig, RetryConfig},
    fusionbrain::{Credentials, FusionBrainBackend},
    provider::HttpKeypointProvider,
    retry::RetryController,
    store::DirectoryStore,
};
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    /// Base URL of the keypoint inference service.
    #[structopt(short, long, default_value = "http://localhost:8000", env = "KEYPOINT_SERVICE_URL")]
    keypoint_url: String,

    #[structopt(short, long)]
    show_progress: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Check one image file: raw image bytes, or base64 / data-URI text.
    Check {
        image: PathBuf,

        #[structopt(flatten)]
        checker: CheckerConfig,
    },
    /// Generate an image from a prompt, regenerating until it passes.
    Generate {
        prompt: String,

        /// Directory accepted images are written to.
        #[structopt(short, long, default_value = "generated")]
        out: PathBuf,

        #[structopt(flatten)]
        checker: CheckerConfig,

        #[structopt(flatten)]
        retry: RetryConfig,

        #[structopt(flatten)]
        poll: PollConfig,

        #[structopt(flatten)]
        credentials: Credentials,
    },
}

/// Read an image file as a base64 payload, accepting files that already
/// hold base64 text.
fn read_encoded(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("failed reading {:?}", path))?;
    if let Ok(text) = std::str::from_utf8(&bytes) {
        if decode_image(text).is_ok() {
            return Ok(text.to_owned());
        }
    }
    Ok(BASE64_STANDARD.encode(bytes))
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner().with_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{prefix:.bold.dim} {spinner} {wide_msg}"),
    );
    pb.enable_steady_tick(100);
    pb
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(opt.log_level),
    )?;

    let provider = HttpKeypointProvider::new(opt.keypoint_url)?;

    match opt.command {
        Command::Check { image, checker } => {
            let encoded = read_encoded(&image)?;
            let report = PhotoChecker::new(provider, checker).check(&encoded);
            info!(accepted = report.accepted, "check finished");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Generate {
            prompt,
            out,
            checker,
            retry,
            poll,
            credentials,
        } => {
            let mut controller = RetryController::new(
                FusionBrainBackend::new(credentials)?,
                PhotoChecker::new(provider, checker),
                DirectoryStore::new(out),
                retry,
                poll,
            );
            if opt.show_progress {
                controller = controller.with_progress(spinner());
            }

            let outcome = controller
                .run(&prompt)
                .context("failed persisting accepted image")?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.accepted {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
