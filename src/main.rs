use std::{path::PathBuf, process::ExitCode};

use awlc::{
    CompileError,
    backend::{CodegenOptions, pretty_print},
    compile,
    frontend::CompilationUnit,
    middle::type_check::TypeChecker,
};
use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON encoded compilation units, merged in order
    source_files: Vec<PathBuf>,
    /// Words of shared memory on the target machine
    #[arg(long, default_value_t = 256)]
    shared_memory: u32,
    /// Leave descriptive comments out of the listing
    #[arg(long)]
    no_comments: bool,
    /// Disable colored output
    #[arg(long)]
    no_color: bool,
    /// Write the listing to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Stop after type checking
    #[arg(long)]
    check_only: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.no_color {
        colored::control::set_override(false);
    }

    if args.source_files.is_empty() {
        Args::command()
            .error(ErrorKind::MissingRequiredArgument, "Missing source files!")
            .exit();
    }

    for source_file in &args.source_files {
        if !source_file.is_file() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Input path '{}' is not a file!", source_file.display()),
                )
                .exit()
        }
    }

    /* Read in compilation units */

    let mut unit = CompilationUnit::new();

    for path in &args.source_files {
        let parsed = std::fs::read_to_string(path)
            .map_err(|err| err.to_string())
            .and_then(|json| CompilationUnit::from_json(&json).map_err(|err| err.to_string()));

        match parsed {
            Ok(parsed) => unit.merge(parsed),
            Err(err) => {
                eprintln!(
                    "{}: failed to read '{}': {err}",
                    "error".red().bold(),
                    path.display()
                );
                return ExitCode::FAILURE;
            }
        }
    }

    tracing::debug!(
        enums = unit.enums.len(),
        classes = unit.classes.len(),
        functions = unit.functions.len(),
        statements = unit.statements.len(),
        "loaded compilation unit"
    );

    if args.check_only {
        return match TypeChecker::check(&unit) {
            Ok(_) => ExitCode::SUCCESS,
            Err(diagnostics) => {
                report(&CompileError::Diagnostics(diagnostics));
                ExitCode::FAILURE
            }
        };
    }

    let options = CodegenOptions {
        shared_memory_size: args.shared_memory,
        emit_comments: !args.no_comments,
    };

    let program = match compile(&unit, &options) {
        Ok(program) => program,
        Err(err) => {
            report(&err);
            return ExitCode::FAILURE;
        }
    };

    let listing = pretty_print::format_program(&program);

    match &args.output {
        Some(path) => {
            if let Err(err) = std::fs::write(path, strip_ansi_escapes::strip_str(&listing)) {
                eprintln!(
                    "{}: failed to write '{}': {err}",
                    "error".red().bold(),
                    path.display()
                );
                return ExitCode::FAILURE;
            }
        }
        None => print!("{listing}"),
    }

    ExitCode::SUCCESS
}

fn report(err: &CompileError) {
    match err {
        CompileError::Diagnostics(diagnostics) => {
            for diagnostic in diagnostics {
                eprintln!("{}", diagnostic.render());
            }

            eprintln!("{}: {err}", "error".red().bold());
        }
        CompileError::Internal(_) => eprintln!("{}: {err}", "error".red().bold()),
    }
}
