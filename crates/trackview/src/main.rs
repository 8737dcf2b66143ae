mod cli;
mod detector;
mod paths;
mod run;
mod scene;
mod session;
mod synthetic;

use anyhow::Result;
use cli::Command;
use paths::AppPaths;
use run::MODE_KEYS;
use viewdispatch::ViewMode;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Modes) => {
            list_modes();
            Ok(())
        }
        Some(Command::Where) => print_paths(),
        None => run::run(cli.run),
    }
}

fn list_modes() {
    println!("View modes:");
    for (mode, key) in ViewMode::ALL.iter().zip(MODE_KEYS) {
        println!(
            "  {:>2}  {:<20} key={:<2} {}",
            mode.ordinal(),
            mode.slug(),
            key,
            mode.label()
        );
    }
}

fn print_paths() -> Result<()> {
    let paths = AppPaths::discover()?;
    println!("Configuration directories:");
    println!("  config:     {}", paths.config_dir().display());
    println!("  data:       {}", paths.data_dir().display());
    println!("  config file: {}", paths.config_file().display());
    println!("  session:    {}", paths.session_file().display());
    Ok(())
}
