use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ufd")]
#[command(author, version, about = "Platform-aware media downloader driving yt-dlp", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// What to fetch and how to authenticate
#[derive(Args, Debug)]
pub struct Target {
    /// Media page URL
    pub url: String,

    /// Platform identifier (youtube, facebook, twitter, instagram, tiktok, reddit)
    #[arg(short, long)]
    pub platform: String,

    /// Media format: video or audio
    #[arg(short, long, default_value = "video")]
    pub format: String,

    /// Quality tier for video: highest, 1080p, 720p, 480p, 360p
    #[arg(short, long, default_value = "highest")]
    pub quality: String,

    /// Raw Cookie header value from a signed-in browser session
    #[arg(long, env = "UFD_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print media metadata as JSON
    Info {
        #[command(flatten)]
        target: Target,
    },

    /// Download media to a file, a directory or stdout
    Get {
        #[command(flatten)]
        target: Target,

        /// Output file or directory; "-" writes to stdout. Defaults to the current directory
        #[arg(short, long)]
        output: Option<String>,

        /// Stream straight from the extractor instead of relaying a temp file
        #[arg(long)]
        pipe: bool,
    },

    /// Check for and install a newer yt-dlp
    UpdateExtractor,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
