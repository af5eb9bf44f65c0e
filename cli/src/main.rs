// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thin driver binary: parses a source file and runs it through the
//! execution core, or just prints the AST. Not part of the specified
//! core — a convenience for exercising `engine` and
//! `parser` from the command line.

mod theme;

use clap::{Parser as ClapParser, Subcommand};
use cliclack::{input, intro, set_theme};
use engine::context::{Agent, EngineOptions};
use engine::interpreter::run_program;
use parser::parser::Parser;
use serde::Deserialize;
use theme::DefaultTheme;
use tracing_subscriber::EnvFilter;

/// Operator-facing override for the tunables `EngineOptions` otherwise
/// defaults (SPEC_FULL.md §B.3): lets a deployment pin tier thresholds
/// without recompiling. Every field is optional; anything absent falls
/// through to `EngineOptions::default()`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    max_call_depth: Option<u32>,
    jit_enabled: Option<bool>,
    bytecode_threshold: Option<u64>,
    optimized_threshold: Option<u64>,
    machine_code_threshold: Option<u64>,
    max_deopts: Option<u32>,
}

impl ConfigFile {
    fn apply(&self, options: &mut EngineOptions) {
        if let Some(v) = self.max_call_depth {
            options.max_call_depth = v;
        }
        if let Some(v) = self.jit_enabled {
            options.jit_enabled = v;
        }
        if let Some(v) = self.bytecode_threshold {
            options.profiler_thresholds.bytecode = v;
        }
        if let Some(v) = self.optimized_threshold {
            options.profiler_thresholds.optimized = v;
        }
        if let Some(v) = self.machine_code_threshold {
            options.profiler_thresholds.machine_code = v;
        }
        if let Some(v) = self.max_deopts {
            options.profiler_thresholds.max_deopts = v;
        }
    }
}

#[derive(Debug, ClapParser)]
#[command(name = "aurora")]
#[command(about = "A tiered ECMAScript execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enables tracing output (tier promotions, deopts); also honors RUST_LOG.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parses a file and prints its AST.
    Parse {
        path: String,
        #[arg(short, long, default_value_t = false)]
        pretty: bool,
    },

    /// Parses and runs a file, printing the completion value.
    Run {
        path: String,

        /// Lowers profiler promotion thresholds so small scripts reach the
        /// bytecode/JIT tiers within the process lifetime.
        #[arg(long)]
        eager_tiering: bool,

        /// TOML file of `EngineOptions` overrides (call-stack depth, tier
        /// thresholds, JIT enable/disable). Applied after `--eager-tiering`.
        #[arg(long)]
        config: Option<String>,
    },

    /// Starts an interactive read-eval-print loop sharing one `Agent`
    /// (and therefore one global environment) across lines.
    Repl,
}

fn install_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    install_tracing(args.verbose);

    match args.command {
        Command::Parse { path, pretty } => {
            let source = std::fs::read_to_string(&path)?;
            let mut parser = Parser::new(&source)?;
            let program = parser.parse_program()?;
            if pretty {
                println!("{program:#?}");
            } else {
                println!("{program:?}");
            }
        }
        Command::Run { path, eager_tiering, config } => {
            let source = std::fs::read_to_string(&path)?;
            let mut parser = Parser::new(&source)?;
            let program = parser.parse_program()?;

            let mut options = EngineOptions::default();
            if eager_tiering {
                options.profiler_thresholds = engine::profiler::Thresholds {
                    bytecode: 1,
                    optimized: 2,
                    machine_code: 3,
                    max_deopts: 3,
                };
            }
            if let Some(path) = config {
                let text = std::fs::read_to_string(&path)?;
                let file: ConfigFile = toml::from_str(&text)?;
                file.apply(&mut options);
            }
            let mut agent = Agent::new(options);
            match run_program(&mut agent, &program) {
                Ok(value) => {
                    let rendered = value.to_string(&mut agent).unwrap_or_else(|_| "<unrepresentable>".into());
                    println!("{rendered}");
                }
                Err(err) => {
                    let rendered = err.value.to_string(&mut agent).unwrap_or_else(|_| "<error>".into());
                    eprintln!("Uncaught {rendered}");
                    eprint!("{}", err.stack);
                    std::process::exit(1);
                }
            }
        }
        Command::Repl => run_repl()?,
    }

    Ok(())
}

/// One `Agent` for the whole session: `run_program` reseeds its bindings
/// into `agent.global_environment()` every call, so a `var`/function
/// declared on one line is visible to the next.
fn run_repl() -> Result<(), Box<dyn std::error::Error>> {
    set_theme(DefaultTheme);
    println!();
    let mut agent = Agent::new(EngineOptions::default());
    let mut placeholder = "Enter a line of JavaScript".to_string();

    let _ = ctrlc::set_handler(|| {
        std::process::exit(0);
    });

    loop {
        intro("Aurora Repl")?;
        let line: String = input("").placeholder(&placeholder).interact()?;

        if line == "exit" {
            std::process::exit(0);
        }
        placeholder = line.clone();

        let mut parser = match Parser::new(&line) {
            Ok(parser) => parser,
            Err(err) => {
                eprintln!("Parse error: {err:?}\n");
                continue;
            }
        };
        let program = match parser.parse_program() {
            Ok(program) => program,
            Err(err) => {
                eprintln!("Parse error: {err:?}\n");
                continue;
            }
        };
        match run_program(&mut agent, &program) {
            Ok(value) => {
                let rendered = value.to_string(&mut agent).unwrap_or_else(|_| "<unrepresentable>".into());
                println!("{rendered}\n");
            }
            Err(err) => {
                let rendered = err.value.to_string(&mut agent).unwrap_or_else(|_| "<error>".into());
                eprintln!("Uncaught {rendered}\n");
            }
        }
    }
}
