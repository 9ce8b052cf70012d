use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod charts;
mod controller;
mod domain;
mod freq;
mod inputter;
mod model;
mod table;
mod ui;

use controller::Controller;
use domain::{TCConfig, TCError};
use model::{Model, Status};
use ui::TableUI;

#[derive(Parser, Debug)]
#[command(
    name = "tabchart",
    version,
    about = "View and edit a csv file in a grid, with per-column frequency charts."
)]
struct Cli {
    /// CSV file to load (header row expected)
    file: String,

    /// Columns with more distinct values than this get a deferred chart
    #[arg(short = 't', long, default_value_t = 10)]
    threshold: usize,

    /// Maximum rendered grid column width
    #[arg(long, default_value_t = 40)]
    max_column_width: usize,

    /// Maximum chart legend width
    #[arg(long, default_value_t = 23)]
    max_label_width: usize,

    /// Log file, the tui keeps the terminal for itself
    #[arg(long, default_value = "tabchart.log")]
    log_file: PathBuf,
}

fn init_logging(path: &PathBuf) -> Result<(), TCError> {
    let file = std::fs::File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = run(&cli);
    ratatui::restore();
    match result {
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cli: &Cli) -> Result<(), TCError> {
    init_logging(&cli.log_file)?;
    info!("Starting tabchart!");

    let path = match shellexpand::full(&cli.file) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => return Err(TCError::LoadingFailed(format!("{e}"))),
    };

    let config = TCConfig::default()
        .chart_threshold(cli.threshold)
        .max_column_width(cli.max_column_width)
        .max_label_width(cli.max_label_width);

    let ui = TableUI::new(&config);
    let controller = Controller::new(&config);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    let mut model = Model::init(&config, size.width as usize, size.height as usize);
    model.load_data_file(path)?;

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}
