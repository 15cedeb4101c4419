//! Virtual machine configuration.

/// Default operand stack capacity.
pub const STACK_MAX: usize = 256;

/// Settings fixed for the lifetime of a `Vm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum number of values on the operand stack.
    pub stack_max: usize,
    /// Emit a `trace` event with the stack and instruction before each step.
    pub trace_execution: bool,
    /// Print the returned value when `ret` executes.
    pub print_on_return: bool,
    /// Initial seed for the random opcodes. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_max: STACK_MAX,
            trace_execution: false,
            print_on_return: false,
            seed: None,
        }
    }
}

impl VmConfig {
    pub fn with_stack_max(mut self, stack_max: usize) -> Self {
        self.stack_max = stack_max;
        self
    }

    pub fn with_trace_execution(mut self, trace: bool) -> Self {
        self.trace_execution = trace;
        self
    }

    pub fn with_print_on_return(mut self, print: bool) -> Self {
        self.print_on_return = print;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
