use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueEnum};
use indoc::indoc;

/// Search window, in days, for the spaces of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Timeframe {
    #[value(name = "7")]
    Week,
    #[value(name = "14")]
    TwoWeeks,
    #[value(name = "30")]
    Month,
    #[value(name = "90")]
    Quarter,
    #[value(name = "120")]
    FourMonths,
}

impl Timeframe {
    pub fn days(self) -> i64 {
        match self {
            Timeframe::Week => 7,
            Timeframe::TwoWeeks => 14,
            Timeframe::Month => 30,
            Timeframe::Quarter => 90,
            Timeframe::FourMonths => 120,
        }
    }

    pub fn duration(self) -> time::Duration {
        time::Duration::days(self.days())
    }
}

macro_rules! arg_env {
    ($v:literal) => {
        concat!("SPACEREC_", $v)
    };
}

/// Record and archive live audio/video Spaces.
/// Download with a fallback downloader and fix aspect-ratio changes in videos.
#[derive(Parser, Debug)]
#[command(version, after_help = AFTER_HELP)]
#[command(group(ArgGroup::new("input").required(true).multiple(true).args(["profile", "space"])))]
pub struct Args {
    /// Full path to the Netscape cookie file exported from the browser
    #[arg(short, long, env = arg_env!("COOKIE"))]
    pub cookie: PathBuf,

    /// API access token. Only needed to search the spaces of profiles
    #[arg(short, long, env = arg_env!("ACCESS_TOKEN"), hide_env_values = true)]
    pub access_token: Option<String>,

    /// Timeframe in days to search for recordings
    #[arg(short, long, value_enum, default_value = "7", env = arg_env!("TIMEFRAME"))]
    pub timeframe: Timeframe,

    /// Output directory for saving recordings.
    /// Defaults to `X-Recorder` in the downloads directory
    #[arg(short, long, env = arg_env!("OUTPUT"))]
    pub output: Option<PathBuf>,

    /// Enable verbose output (API connections, commands, and downloads)
    #[arg(short, long, env = arg_env!("DEBUG"))]
    pub debug: bool,

    /// Profile name(s) to search for spaces (comma-separated if multiple)
    #[arg(short, long, value_delimiter = ',', env = arg_env!("PROFILE"))]
    pub profile: Vec<String>,

    /// Direct link to a specific space. Can be set multiple times
    #[arg(short, long)]
    pub space: Vec<String>,

    /// Spaces to download among the ones found for the profiles,
    /// as their 1-based indexes (comma-separated if multiple)
    #[arg(long, conflicts_with = "interactive")]
    pub pick: Option<String>,

    /// Ask which of the spaces found for the profiles to download.
    /// Without this flag nor --pick, every space found is downloaded
    #[arg(short, long)]
    pub interactive: bool,

    /// Path to a TOML file with advanced settings
    #[arg(long, env = arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,
}

const AFTER_HELP: &str = indoc! {"
    Files are written to <OUTPUT>/<SPACE_ID>/<DATE>-<TITLE>-#<SPACE_ID>.m4a,
    plus a .mp4 file with a uniform geometry for video spaces.
"};

impl Args {
    /// The output directory, with the default one if none was given
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            dirs::download_dir()
                .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("X-Recorder")
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_profiles_and_timeframe() {
        let args = Args::try_parse_from([
            "spacerec", "-c", "cookies.txt", "-p", "alice,bob", "-t", "30", "-a", "tok",
        ])
        .unwrap();

        assert_eq!(args.profile, vec!["alice", "bob"]);
        assert_eq!(args.timeframe, Timeframe::Month);
        assert_eq!(args.timeframe.days(), 30);
        assert_eq!(args.access_token.as_deref(), Some("tok"));
    }

    #[test]
    fn default_timeframe_is_a_week() {
        let args =
            Args::try_parse_from(["spacerec", "-c", "c.txt", "-s", "https://x.com/i/spaces/A"])
                .unwrap();
        assert_eq!(args.timeframe, Timeframe::Week);
    }

    #[test]
    fn rejects_unknown_timeframe() {
        let res = Args::try_parse_from(["spacerec", "-c", "c.txt", "-p", "a", "-t", "8"]);
        assert!(res.is_err());
    }

    #[test]
    fn requires_profile_or_space() {
        assert!(Args::try_parse_from(["spacerec", "-c", "c.txt"]).is_err());
    }

    #[test]
    fn help_tells_the_default_selection() {
        let help = Args::command().render_long_help().to_string();
        assert!(help.contains("every space found is downloaded"));
    }

    #[test]
    fn pick_and_interactive_conflict() {
        let res = Args::try_parse_from([
            "spacerec", "-c", "c.txt", "-p", "a", "--pick", "1", "-i",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn explicit_output_wins() {
        let args = Args::try_parse_from([
            "spacerec", "-c", "c.txt", "-s", "link", "-o", "/tmp/out",
        ])
        .unwrap();
        assert_eq!(args.output_dir(), PathBuf::from("/tmp/out"));
    }
}
