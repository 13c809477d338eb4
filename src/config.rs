use std::time::Duration;

const DEFAULT_MIN_SCORE: &str = "1";
const DEFAULT_POLL_ATTEMPTS: &str = "30";
const DEFAULT_POLL_DELAY_MS: &str = "5000";
const DEFAULT_MAX_ATTEMPTS: &str = "3";
const DEFAULT_WIDTH: &str = "1024";
const DEFAULT_HEIGHT: &str = "1024";

#[derive(Debug, Clone, Copy, PartialEq, Eq, structopt::StructOpt)]
pub struct CheckerConfig {
    /// Minimum aggregate score for an image to be accepted.
    #[structopt(short, long, default_value = DEFAULT_MIN_SCORE, allow_hyphen_values = true)]
    pub min_score: i32,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            min_score: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, structopt::StructOpt)]
pub struct PollConfig {
    /// Number of status polls before a generation job times out.
    #[structopt(long, default_value = DEFAULT_POLL_ATTEMPTS)]
    pub poll_attempts: usize,

    /// Delay between status polls, in milliseconds.
    #[structopt(long, default_value = DEFAULT_POLL_DELAY_MS)]
    pub poll_delay_ms: u64,
}

impl PollConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    /// Total time budget for one job.
    pub fn timeout(&self) -> Duration {
        self.delay() * u32::try_from(self.poll_attempts).unwrap_or(u32::MAX)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 30,
            poll_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, structopt::StructOpt)]
pub struct RetryConfig {
    /// Maximum number of generation attempts per run.
    #[structopt(short = "-n", long, default_value = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,

    /// Width of the generated image.
    #[structopt(short, long, default_value = DEFAULT_WIDTH)]
    pub width: u32,

    /// Height of the generated image.
    #[structopt(short = "-H", long, default_value = DEFAULT_HEIGHT)]
    pub height: u32,

    /// Generation style passed through to the backend, e.g. ANIME or UHD.
    #[structopt(long)]
    pub style: Option<String>,

    /// Negative prompt passed through to the generation backend.
    #[structopt(long)]
    pub negative_prompt: Option<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            width: 1024,
            height: 1024,
            style: None,
            negative_prompt: None,
        }
    }
}
