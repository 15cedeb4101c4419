//! Interactive assembler prompt. Each line is assembled and run as its own
//! chunk on one long-lived VM, so globals carry over between lines.

use std::io::{self, BufRead, Write};
use std::path::Path;

use colored::Colorize;

use crate::bytecode::{assemble, disassemble_chunk, StringTable, Value, Vm};
use crate::config::VmConfig;
use crate::error::InterpretError;

/// Outcome of one line of input.
#[derive(Debug, PartialEq)]
pub enum Reply {
    /// Text to show; may be empty.
    Text(String),
    /// Error text to show in red.
    Error(String),
    Quit,
}

pub struct Repl {
    vm: Vm,
    config: VmConfig,
    history: Vec<String>,
}

impl Repl {
    pub fn new(config: VmConfig) -> Self {
        Self {
            vm: Vm::new(config.clone()),
            config,
            history: Vec::new(),
        }
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn run(&mut self) -> io::Result<()> {
        println!("xasm {} - type .help for commands", env!("CARGO_PKG_VERSION"));

        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut stdout = io::stdout();
        loop {
            print!("> ");
            stdout.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                println!();
                return Ok(());
            }
            match self.handle(line.trim_end()) {
                Reply::Text(text) if text.is_empty() => {}
                Reply::Text(text) => println!("{}", text),
                Reply::Error(text) => eprintln!("{}", text.red()),
                Reply::Quit => return Ok(()),
            }
        }
    }

    /// Process one line of input.
    pub fn handle(&mut self, line: &str) -> Reply {
        let line = line.trim();
        if line.is_empty() {
            return Reply::Text(String::new());
        }
        if line.starts_with('.') || line == "exit" || line == "quit" {
            return self.command(line);
        }
        self.history.push(line.to_string());
        self.execute(line)
    }

    fn execute(&mut self, source: &str) -> Reply {
        match self.vm.interpret(source) {
            Ok(Value::Nil) => Reply::Text(String::new()),
            Ok(value) => Reply::Text(value.tagged()),
            Err(error) => Reply::Error(describe(&error)),
        }
    }

    fn command(&mut self, line: &str) -> Reply {
        let (name, argument) = match line.split_once(' ') {
            Some((name, argument)) => (name, argument.trim()),
            None => (line, ""),
        };
        match name {
            ".exit" | ".quit" | "exit" | "quit" => Reply::Quit,
            ".help" => Reply::Text(HELP.trim_end().to_string()),
            ".globals" => Reply::Text(self.list_globals()),
            ".history" => Reply::Text(
                self.history
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| format!("{:4}  {}", i + 1, entry))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            ".reset" => {
                self.vm = Vm::new(self.config.clone());
                Reply::Text("Environment reset.".to_string())
            }
            ".disasm" if !argument.is_empty() => {
                let mut strings = StringTable::new();
                match assemble(argument, &mut strings) {
                    Ok(chunk) => Reply::Text(disassemble_chunk(&chunk, "repl").trim_end().to_string()),
                    Err(error) => Reply::Error(error.to_string()),
                }
            }
            ".load" if !argument.is_empty() => self.load(Path::new(argument)),
            ".disasm" | ".load" => Reply::Error(format!("Usage: {} <argument>", name)),
            _ => Reply::Error(format!(
                "Unknown command: {}. Type .help for available commands.",
                name
            )),
        }
    }

    fn load(&mut self, path: &Path) -> Reply {
        match std::fs::read_to_string(path) {
            Ok(source) => self.execute(&source),
            Err(error) => Reply::Error(format!("Could not read '{}': {}", path.display(), error)),
        }
    }

    fn list_globals(&self) -> String {
        let mut globals: Vec<String> = self
            .vm
            .globals()
            .iter()
            .map(|(name, value)| format!("{} = {}", name, value.tagged()))
            .collect();
        if globals.is_empty() {
            return "No globals defined.".to_string();
        }
        globals.sort();
        globals.join("\n")
    }
}

fn describe(error: &InterpretError) -> String {
    match error {
        InterpretError::Compile(e) => e.to_string(),
        InterpretError::Runtime(e) => format!("Runtime error: {}", e),
    }
}

const HELP: &str = "
.help            Show this message
.globals         List global variables
.history         Show entered lines
.disasm <code>   Assemble a line and show its bytecode
.load <file>     Run a file on the current VM
.reset           Start over with a fresh VM
.exit            Leave
";
