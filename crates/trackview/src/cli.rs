use std::path::PathBuf;

use clap::{Parser, Subcommand};
use viewdispatch::{FrameSize, GpuPower, ViewMode};

#[derive(Parser, Debug)]
#[command(
    name = "trackview",
    author,
    version,
    about = "Inspect tracking pipeline artifacts one view mode at a time",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file to load instead of the one in the config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// View mode to start in, as a slug (e.g. `fitted-model`) or ordinal (0-11).
    /// Overrides the mode restored from the previous session.
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<ViewMode>,

    /// Logical frame size of the engine artifacts (e.g. `768x576`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub frame_size: Option<FrameSize>,

    /// Initial window size (e.g. `1024x768`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub window_size: Option<FrameSize>,

    /// Adapter preference: `low` or `high`.
    #[arg(long, value_name = "POWER", value_parser = parse_power)]
    pub power: Option<GpuPower>,

    /// Present without waiting for vertical sync.
    #[arg(long)]
    pub no_vsync: bool,

    /// Render one frame in a hidden window, write it to this PNG, then exit.
    #[arg(long, value_name = "PATH", value_parser = parse_snapshot_path)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every view mode with its ordinal, slug and key binding.
    Modes,
    /// Print resolved config and data directories.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_mode(value: &str) -> Result<ViewMode, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("view mode must not be empty".to_string());
    }
    trimmed.parse::<ViewMode>().map_err(|err| err.to_string())
}

pub fn parse_size(value: &str) -> Result<FrameSize, String> {
    value.parse::<FrameSize>()
}

pub fn parse_power(value: &str) -> Result<GpuPower, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("GPU power preference must not be empty".to_string());
    }
    trimmed.parse::<GpuPower>()
}

pub fn parse_snapshot_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Ok(path),
        None => Err("snapshot path has no extension; expected .png".to_string()),
        Some(other) => Err(format!(
            "unsupported snapshot format '.{other}'; expected .png"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes_by_slug_and_ordinal() {
        assert_eq!(parse_mode("fitted-model").unwrap(), ViewMode::FittedModel);
        assert_eq!(parse_mode(" 9 ").unwrap(), ViewMode::Contours);
        assert!(parse_mode("").is_err());
        assert!(parse_mode("12").is_err());
        assert!(parse_mode("wireframe").is_err());
    }

    #[test]
    fn snapshot_requires_png() {
        assert!(parse_snapshot_path("out/frame.PNG").is_ok());
        assert!(parse_snapshot_path("frame.exr").is_err());
        assert!(parse_snapshot_path("frame").is_err());
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "trackview",
            "--mode",
            "contours",
            "--frame-size",
            "640x480",
            "--power",
            "low",
            "--no-vsync",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.mode, Some(ViewMode::Contours));
        assert_eq!(cli.run.frame_size, Some(FrameSize::new(640, 480)));
        assert_eq!(cli.run.window_size, None);
        assert_eq!(cli.run.power, Some(GpuPower::Low));
        assert!(cli.run.no_vsync);
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["trackview", "modes"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Modes)));
        assert!(Cli::try_parse_from(["trackview", "--window-size", "0x10"]).is_err());
    }
}
