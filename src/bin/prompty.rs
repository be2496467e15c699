use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::error;
use prompty::{CancelToken, Engine, EngineOptions, Value};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Opening tag delimiter.
    #[arg(long, default_value = "{~")]
    open_delim: String,

    /// Closing tag delimiter.
    #[arg(long, default_value = "~}")]
    close_delim: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a template file against JSON data.
    Render {
        /// Template file to render.
        file: PathBuf,

        /// JSON file with the data context.
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// Statically validate a template file.
    Validate {
        /// Template file to check.
        file: PathBuf,
    },
}

fn main() {
    simple_logger::init_with_level(log::Level::Warn).unwrap();
    let args = Cli::parse();

    let options = EngineOptions {
        open_delim: args.open_delim,
        close_delim: args.close_delim,
        ..EngineOptions::default()
    };

    let engine = match Engine::with_options(options) {
        Ok(engine) => engine,
        Err(engine_error) => {
            error!("{engine_error}");
            std::process::exit(-1);
        }
    };

    match args.command {
        Command::Render { file, data } => {
            let source = read_file(&file);

            let data = match data {
                Some(path) => {
                    let raw = read_file(&path);
                    match serde_json::from_str::<serde_json::Value>(&raw) {
                        Ok(json) => Value::from(json),
                        Err(json_error) => {
                            error!("could not parse '{}': {json_error}", path.to_string_lossy());
                            std::process::exit(-1);
                        }
                    }
                }
                None => Value::Null,
            };

            match engine.execute(&CancelToken::new(), &source, &data) {
                Ok(output) => print!("{output}"),
                Err(engine_error) => {
                    error!("{engine_error}");
                    std::process::exit(-1);
                }
            }
        }
        Command::Validate { file } => {
            let source = read_file(&file);
            let result = engine.validate(&source);

            for issue in &result.issues {
                eprintln!("{issue}");
            }

            if !result.is_valid() {
                std::process::exit(-1);
            }
        }
    }
}

fn read_file(path: &PathBuf) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(io_error) => {
            error!("could not read '{}': {io_error}", path.to_string_lossy());
            std::process::exit(-1);
        }
    }
}
