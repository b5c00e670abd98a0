use clap::Parser;
use extramark::{Config, Flavor, Markdown};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

/// Convert Markdown or Markdown Extra to HTML
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input file; reads stdin when omitted
    input: Option<PathBuf>,

    /// Classic Markdown only, without the Extra syntax
    #[arg(long)]
    basic: bool,

    /// Close empty elements with `>` instead of ` />`
    #[arg(long)]
    html: bool,

    /// Columns per tab stop
    #[arg(long)]
    tab_width: Option<usize>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log each pass to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match run(&cli) {
        Ok(html) => {
            print!("{html}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("extramark: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> extramark::Result<String> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if cli.basic {
        config.flavor = Flavor::Basic;
    }
    if cli.html {
        config.empty_element_suffix = ">".to_string();
    }
    if let Some(tab_width) = cli.tab_width {
        config.tab_width = tab_width;
    }

    let input = match &cli.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            input
        }
    };

    Markdown::new(config)?.try_transform(&input)
}
