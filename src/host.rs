//! External collaborators: the interactive debugger UI, the console, and
//! raw-file I/O, specified only at their interface.

use std::io;

use crate::instruction::{Ins, Pos};

/// Invoked by the dispatcher when a breakpoint is armed or `BREAKPOINT`
/// executes. A no-op implementation disables interactive stepping.
pub trait DebugHook {
    fn on_step(&mut self, pos: &Pos, ins: &Ins);
    fn is_stepping(&self) -> bool {
        false
    }
}

/// A hook that never stops execution.
#[derive(Debug, Default)]
pub struct NullDebugHook;

impl DebugHook for NullDebugHook {
    fn on_step(&mut self, _pos: &Pos, _ins: &Ins) {}
}

/// Host console, consulted by `SOUT`/`SIN`. `--enable-colorful-output` and
/// `--output-redirect` are applied by the implementation chosen in `main`.
pub trait Console {
    fn write(&mut self, text: &str) -> io::Result<()>;
    fn read_line(&mut self) -> io::Result<String>;
}

/// The default console: stdio, no color processing.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn write(&mut self, text: &str) -> io::Result<()> {
        use std::io::Write;
        print!("{text}");
        io::stdout().flush()
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        Ok(buf)
    }
}

/// Raw-file I/O, consulted by `FILE_*` opcodes.
pub trait FileIo {
    fn open_read(&self, path: &str) -> io::Result<String>;
    fn open_write(&self, path: &str, contents: &str) -> io::Result<()>;
}

/// The default file I/O: plain `std::fs`.
#[derive(Debug, Default)]
pub struct StdFileIo;

impl FileIo for StdFileIo {
    fn open_read(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn open_write(&self, path: &str, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }
}
