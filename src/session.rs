//! One interpreter session: the pipeline from source bytes to executed code.
//!
//! Each call to [`Session::run`] is one top-level unit (a file, or one REPL
//! line).  Globals, and any closures defined by earlier units, persist across
//! calls.

use std::io::{self, Write};

use log::{debug, info};

use crate::error::{ErrorReporter, LoxError};
use crate::interpreter::Interpreter;
use crate::parser::parse;
use crate::resolver::resolve;
use crate::scanner::scan_all;

pub struct Session<W: Write = io::Stdout> {
    interpreter: Interpreter<W>,
}

impl Session<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Session<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Session<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            interpreter: Interpreter::with_output(out),
        }
    }

    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }

    /// Scan, parse, resolve and execute `source`.
    ///
    /// Static errors are all collected and nothing is executed.  A runtime
    /// error stops the unit; the session stays usable afterwards.
    pub fn run(&mut self, source: &[u8]) -> Result<(), Vec<LoxError>> {
        let (tokens, mut errors) = scan_all(source);
        let (program, parse_errors) = parse(tokens);
        errors.extend(parse_errors);

        if !errors.is_empty() {
            info!("Skipping execution: {} syntax error(s)", errors.len());
            return Err(errors);
        }

        let (locals, resolve_errors) = resolve(&program);

        if !resolve_errors.is_empty() {
            info!(
                "Skipping execution: {} resolution error(s)",
                resolve_errors.len()
            );
            return Err(resolve_errors);
        }

        debug!("Executing {} top-level statement(s)", program.len());

        self.interpreter
            .interpret(&program, locals)
            .map_err(|e| vec![e])
    }

    /// [`run`](Self::run), handing every error to `reporter`.  Returns the
    /// exit status the errors call for, or `None` on success.
    pub fn run_reported(&mut self, source: &[u8], reporter: &mut dyn ErrorReporter) -> Option<i32> {
        match self.run(source) {
            Ok(()) => None,
            Err(errors) => {
                for error in &errors {
                    reporter.report(error);
                }
                Some(exit_code(&errors))
            }
        }
    }
}

/// Highest exit status among `errors` (runtime outranks static).
pub fn exit_code(errors: &[LoxError]) -> i32 {
    errors.iter().map(LoxError::exit_code).max().unwrap_or(0)
}
