mod logging;
mod settings;

use clap::Parser;
use route_corridor::{CorridorError, CorridorEvaluator, DocumentValues};
use settings::Settings;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::ExitCode;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid query: {0}")]
    Query(#[from] CorridorError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn main() -> ExitCode {
    logging::setup_logging();
    let settings = Settings::parse();
    tracing::debug!("Parsed settings: {:?}", settings);

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<(), CliError> {
    profiling::scope!("run");

    let config = settings.config();
    let query = settings.command.to_query(&config)?;
    let lines = read_lines(settings.input.as_deref())?;
    let documents: Vec<DocumentValues<'_>> = lines
        .iter()
        .map(|line| settings.command.document(line))
        .collect();

    let evaluator = CorridorEvaluator::new(config);
    tracing::info!(
        query = query.name(),
        documents = documents.len(),
        "Evaluating query"
    );

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    if settings.debug {
        for document in &documents {
            let (value, debug) = evaluator.evaluate_debug(&query, document);
            writeln!(out, "{value}\t{debug}")?;
        }
    } else {
        for value in evaluator.evaluate_batch(&query, &documents) {
            writeln!(out, "{value}")?;
        }
    }
    out.flush()?;

    tracing::info!(stats = ?evaluator.cache().stats(), "Done");
    Ok(())
}

fn read_lines(path: Option<&Path>) -> io::Result<Vec<String>> {
    let reader: Box<dyn BufRead> = match path {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };
    reader.lines().collect()
}
