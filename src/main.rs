//! xasm CLI: run or disassemble assembly files, or start the REPL.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, EnvFilter};

use xasm::config::{VmConfig, STACK_MAX};
use xasm::repl::Repl;

/// xasm - a stack-based bytecode virtual machine
#[derive(Parser)]
#[command(name = "xasm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Assemble and run programs on a stack-based bytecode VM")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    vm: VmArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and run a file
    Run {
        /// Path to the assembly file
        file: PathBuf,
    },
    /// Assemble a file and print its bytecode
    Disasm {
        /// Path to the assembly file
        file: PathBuf,
    },
    /// Start the interactive prompt (default)
    Repl,
}

#[derive(Args)]
struct VmArgs {
    /// Trace every executed instruction (at `trace` log level)
    #[arg(long, global = true)]
    trace: bool,

    /// Operand stack capacity
    #[arg(long, global = true, default_value_t = STACK_MAX)]
    stack_max: usize,

    /// Seed for the random opcodes
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Print the value returned by `ret`
    #[arg(long, global = true)]
    print_on_return: bool,
}

impl VmArgs {
    fn config(&self) -> VmConfig {
        let config = VmConfig::default()
            .with_stack_max(self.stack_max)
            .with_trace_execution(self.trace)
            .with_print_on_return(self.print_on_return);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

fn init_logging(trace: bool) {
    let filter = if trace {
        EnvFilter::new("xasm=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.vm.trace);
    let config = cli.vm.config();

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Run { file } => {
            if let Err(e) = xasm::run_file(&file, config) {
                eprintln!("{}", e.to_string().red());
                process::exit(e.exit_code());
            }
        }
        Commands::Disasm { file } => match xasm::disassemble_file(&file) {
            Ok(listing) => print!("{}", listing),
            Err(e) => {
                eprintln!("{}", e.to_string().red());
                process::exit(e.exit_code());
            }
        },
        Commands::Repl => {
            if let Err(e) = Repl::new(config).run() {
                eprintln!("{}", e.to_string().red());
                process::exit(74);
            }
        }
    }
}
