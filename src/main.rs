use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info, warn};
use reedline::{Reedline, Signal};

use rox::ast_printer::AstPrinter;
use rox::error::{ErrorReporter, StderrReporter};
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::scanner::{scan_all, Scanner};
use rox::session::{exit_code, Session};

mod repl;

use repl::{Prompt, Validator};

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Dump the tokens as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Parses a program from a file and prints its syntax tree
    Parse {
        filename: PathBuf,

        /// Dump the tree as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs input from a file as a Lox program, or starts a prompt
    Run { filename: Option<PathBuf> },
}

/// Reads the contents of a file into a Vec<u8>
fn read_file(filename: &Path) -> Result<Vec<u8>> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

/// Like [`read_file`], but a failure ends the process with the I/O status.
fn read_source(filename: &Path) -> Vec<u8> {
    match read_file(filename) {
        Ok(buf) => buf,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(74);
        }
    }
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // `[module:line] - message`, with the crate prefix stripped from the module
    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    info!("Running Tokenize subcommand");
    let buf = read_source(filename);
    let mut tokenized = true;

    if json {
        let (tokens, errors) = scan_all(&buf);
        for e in &errors {
            eprintln!("{}", e);
        }
        tokenized = errors.is_empty();

        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for token in Scanner::new(&buf) {
            match token {
                Ok(token) => {
                    debug!("Scanned token: {}", token);
                    println!("{}", token);
                }

                Err(e) => {
                    tokenized = false;
                    debug!("Tokenization debug: {}", e);
                    eprintln!("{}", e);
                }
            }
        }
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code 65");
        std::process::exit(65);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse_program(filename: &Path, json: bool) -> Result<()> {
    info!("Running Parse subcommand");
    let buf = read_source(filename);

    let (tokens, mut errors) = scan_all(&buf);
    let (program, parse_errors) = rox::parse(tokens);
    errors.extend(parse_errors);

    if !errors.is_empty() {
        let mut reporter = StderrReporter;
        for e in &errors {
            reporter.report(e);
        }
        std::process::exit(exit_code(&errors));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&program)?);
    } else {
        for stmt in &program {
            let ast_str = AstPrinter::print_stmt(stmt);
            debug!("AST: {}", ast_str);
            println!("{}", ast_str);
        }
    }

    info!("Parse subcommand completed");
    Ok(())
}

fn evaluate(filename: &Path) -> Result<()> {
    info!("Running Evaluate subcommand");
    let buf = read_source(filename);

    let (tokens, errors) = scan_all(&buf);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{}", e);
        }
        std::process::exit(65);
    }

    let expr = match Parser::new(tokens).parse_expression() {
        Ok(expr) => expr,
        Err(e) => {
            debug!("Parse debug: {}", e);
            eprintln!("{}", e);
            std::process::exit(65);
        }
    };

    info!("Expression parsed successfully");

    let mut interpreter = Interpreter::new();
    match interpreter.evaluate(&expr) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
        }

        Err(e) => {
            debug!("Evaluation debug: {}", e);
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    }

    info!("Evaluate subcommand completed");
    Ok(())
}

fn run_file(filename: &Path) -> Result<()> {
    info!("Running Run subcommand");
    let buf = read_source(filename);
    info!("Provided input:\n {}", String::from_utf8_lossy(&buf));

    let mut session = Session::new();
    if let Some(code) = session.run_reported(&buf, &mut StderrReporter) {
        debug!("Run failed, exiting with code {}", code);
        std::process::exit(code);
    }

    info!("Program executed successfully");
    Ok(())
}

/// Interactive prompt.  Errors are reported and the session carries on; an
/// unclosed block or string continues on the next line.
fn run_prompt() -> Result<()> {
    info!("Starting interactive prompt");

    let mut editor = Reedline::create()
        .context("Failed to create prompt")?
        .with_validator(Box::new(Validator));

    let mut session = Session::new();
    let mut reporter = StderrReporter;

    loop {
        match editor.read_line(&Prompt) {
            Ok(Signal::Success(line)) => {
                if let Some(code) = session.run_reported(line.as_bytes(), &mut reporter) {
                    debug!("Prompt line failed with code {}", code);
                }
            }

            Ok(Signal::CtrlC) | Ok(Signal::CtrlD) => break,

            Ok(Signal::CtrlL) => {
                if let Err(e) = editor.clear_screen() {
                    warn!("Unable to clear screen: {}", e);
                }
            }

            Err(e) => return Err(e).context("Failed to read prompt line"),
        }
    }

    info!("Prompt closed");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match &args.commands {
        Commands::Tokenize { filename, json } => tokenize(filename, *json),
        Commands::Parse { filename, json } => parse_program(filename, *json),
        Commands::Evaluate { filename } => evaluate(filename),
        Commands::Run {
            filename: Some(filename),
        } => run_file(filename),
        Commands::Run { filename: None } => run_prompt(),
    }
}
