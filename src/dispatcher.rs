//! Dispatcher (G): executes an `InsSet`, threading the instruction pointer,
//! scope acquisition/release, loop/function/ATMP frames and the debug hook
//! together. Handlers live in [`crate::handlers`]; this module owns the
//! control-flow plumbing they report back into.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ErrorKind, RvmError, TraceFragment};
use crate::host::{Console, DebugHook, FileIo, NullDebugHook, StdConsole, StdFileIo};
use crate::instruction::{Ins, InsSet};
use crate::scope::Memory;
use crate::value::custom_type::CustomInstData;

/// What a handler (or a recursive `execute`) reports back to its caller,
/// replacing the source's exception-driven unwind with an explicit return
/// value (§9 design notes).
pub enum Flow {
    /// Fall through to the next instruction.
    Normal,
    /// `JMP`/`JR`/`JT`/`JF`: set the pointer directly, no increment.
    Jump(usize),
    /// `EXIT`: terminate the innermost loop/try body. Carries the optional
    /// target label; `None` means "nearest enclosing one".
    Aborted(Option<String>),
    /// `RET`: terminate the innermost function body.
    AbortedFunction,
    /// `EXPOSE`: an uncaught user error propagating toward the nearest
    /// enclosing `ATMP`.
    Exposed(Rc<RefCell<CustomInstData>>),
}

pub type HandlerResult = Result<Flow, RvmError>;

/// The VM context: memory and host collaborators, threaded through every
/// handler call.
pub struct Dispatcher {
    pub memory: Memory,
    pub debug: Box<dyn DebugHook>,
    pub console: Box<dyn Console>,
    pub fileio: Box<dyn FileIo>,
    pub base_dir: PathBuf,
    pub extensions: Vec<String>,
    rng: StdRng,
}

impl Dispatcher {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Dispatcher {
            memory: Memory::new(),
            debug: Box::new(NullDebugHook),
            console: Box::new(StdConsole),
            fileio: Box::new(StdFileIo),
            base_dir: base_dir.into(),
            extensions: Vec::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Backs `RAND_INT`/`RAND_FLOAT`, kept on the dispatcher rather than
    /// drawn from thread-local state so a future `--seed` flag can make runs
    /// reproducible.
    pub fn next_random(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Runs a full `InsSet` from start to finish. On error-leak, prepends
    /// one trace fragment naming this `InsSet`'s own opening line above the
    /// offending instruction (§4.5) — skipped for the root `InsSet`, which
    /// has no opening line of its own.
    pub fn execute(&mut self, ins_set: &InsSet) -> HandlerResult {
        let mut ptr = 0usize;
        self.run_range(ins_set, &mut ptr, 0, ins_set.ins.len()).map_err(|mut e| {
            if !ins_set.scope_leader.is_empty() {
                let banner = match (&ins_set.leader_pos.file, &e.pos.file) {
                    (Some(a), Some(b)) if a != b => Some(format!("entering {b}")),
                    _ => None,
                };
                e.push_trace(TraceFragment {
                    scope_leader_pos: ins_set.leader_pos.clone(),
                    scope_leader_code: ins_set.scope_leader.clone(),
                    error_pos: e.pos.clone(),
                    error_code: e.raw_src.clone(),
                    file_change_banner: banner,
                });
            }
            e
        })
    }

    /// Core dispatch loop over `ins_set.ins[start..end]`, used both for a
    /// whole `InsSet` and for ATMP's try/finally sub-ranges which share one
    /// flat instruction list and label table (§4.5).
    pub fn run_range(&mut self, ins_set: &InsSet, ptr: &mut usize, start: usize, end: usize) -> HandlerResult {
        *ptr = start;
        while *ptr < end {
            let ins = &ins_set.ins[*ptr];
            if ins.opcode == crate::instruction::END_MARKER_OPCODE {
                *ptr += 1;
                continue;
            }
            if self.debug.is_stepping() {
                self.debug.on_step(&ins.pos, ins);
            }
            let outcome = crate::handlers::dispatch(self, ins_set, ins)?;
            match outcome {
                Flow::Normal => *ptr += 1,
                Flow::Jump(idx) => *ptr = idx,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    /// Looks up a label in `ins_set`, erroring per the "absent label" rule
    /// shared by `JMP`/`JR`/`JT`/`JF`/`EXIT`.
    pub fn resolve_label(&self, ins_set: &InsSet, ins: &Ins, name: &str) -> Result<usize, RvmError> {
        ins_set
            .label_index(name)
            .ok_or_else(|| RvmError::new(ErrorKind::RuntimeError, ins.pos.clone(), ins.raw_src.clone(), format!("no such label '{name}'")))
    }
}

/// Whether an `Aborted` flow returned by a loop/traversal body terminates
/// `body` itself: `None` (a bare `EXIT`) always does; a labeled `EXIT`
/// matches only this body's own `scope_prefix + "END"` and otherwise keeps
/// propagating outward to an enclosing construct.
pub fn absorbs(body: &InsSet, label: &Option<String>) -> bool {
    match label {
        None => true,
        Some(l) => *l == format!("{}END", body.scope_prefix),
    }
}
