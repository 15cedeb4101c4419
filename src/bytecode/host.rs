//! Extension points for the `call`, `brp`, `req` and `host` opcodes.

use crate::bytecode::instruction::OpCode;
use crate::bytecode::value::Value;

/// Which hook opcode fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostHook {
    Call,
    Breakpoint,
    Request,
    Host,
}

impl HostHook {
    pub fn from_opcode(op: OpCode) -> Option<Self> {
        match op {
            OpCode::Call => Some(HostHook::Call),
            OpCode::Breakpoint => Some(HostHook::Breakpoint),
            OpCode::Request => Some(HostHook::Request),
            OpCode::Host => Some(HostHook::Host),
            _ => None,
        }
    }
}

/// The embedding application's side of the hook opcodes.
///
/// Hooks see the operand stack read-only: they cannot consume values or
/// otherwise change VM state.
pub trait Host {
    fn hook(&mut self, hook: HostHook, line: u32, stack: &[Value]);
}

/// Default host: hooks are no-ops apart from a debug event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl Host for NoopHost {
    fn hook(&mut self, hook: HostHook, line: u32, stack: &[Value]) {
        tracing::debug!(?hook, line, depth = stack.len(), "host hook ignored");
    }
}
