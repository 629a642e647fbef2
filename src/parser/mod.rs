//! RA text → `InsSet`. Also parses inline `EXE_RASM` strings and splices
//! `LINK`ed files at parse time.

mod lexer;

use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, RvmError};
use crate::instruction::{Arg, ArgLiteral, Ins, InsSet, Pos, END_MARKER_OPCODE};
use crate::opcode::OpCode;

use lexer::{classify_literal, split_args};

struct OpenScope {
    ins_set: InsSet,
    label_prefix: String,
}

/// Parses RA source into an executable `InsSet` tree, splicing `LINK`ed
/// files in as it goes.
pub struct Parser {
    file: Option<String>,
    base_dir: PathBuf,
    label_counter: u64,
}

impl Parser {
    pub fn new(file: Option<String>, base_dir: impl Into<PathBuf>) -> Self {
        Parser { file, base_dir: base_dir.into(), label_counter: 0 }
    }

    pub fn parse_file(path: impl AsRef<Path>) -> Result<InsSet, RvmError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .map_err(|e| RvmError::new(ErrorKind::FileReadError, Pos::unknown(), "", format!("{}: {e}", path.display())))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut parser = Parser::new(Some(path.display().to_string()), base_dir);
        parser.parse(&src)
    }

    pub fn parse(&mut self, source: &str) -> Result<InsSet, RvmError> {
        let lines = preprocess(source);
        let mut stack: Vec<OpenScope> = vec![OpenScope {
            ins_set: InsSet { scope_prefix: "ROOT-".to_string(), ..Default::default() },
            label_prefix: "ROOT-".to_string(),
        }];

        for (line_no, raw) in lines {
            let pos = Pos::new(line_no, self.file.clone());
            if raw.trim().is_empty() {
                continue;
            }
            let (mnemonic, arg_src) = split_instruction(&raw, &pos)?;

            if mnemonic.eq_ignore_ascii_case("SET") {
                let args = self.parse_args(&arg_src, &pos)?;
                let label = args.first().and_then(Arg::name).ok_or_else(|| {
                    RvmError::new(ErrorKind::SyntaxError, pos.clone(), raw.clone(), "SET requires a label name")
                })?;
                let top = stack.last_mut().unwrap();
                let index = top.ins_set.ins.len();
                top.ins_set.set_label(label.to_string(), index);
                continue;
            }

            if mnemonic.eq_ignore_ascii_case("END") {
                let closed = stack.pop().ok_or_else(|| {
                    RvmError::new(ErrorKind::SyntaxError, pos.clone(), raw.clone(), "END without an open scope")
                })?;
                let top = stack.last_mut().ok_or_else(|| {
                    RvmError::new(ErrorKind::SyntaxError, pos.clone(), raw.clone(), "END without an open scope")
                })?;
                let owner_index = top.ins_set.ins.len() - 1;
                top.ins_set.ins[owner_index].body = Some(closed.ins_set);
                let end_index = top.ins_set.ins.len();
                top.ins_set.ins.push(Ins::new(pos.clone(), END_MARKER_OPCODE, Vec::new(), raw.clone()));
                let label = format!("{}END", closed.label_prefix);
                top.ins_set.set_label(label, end_index);
                continue;
            }

            let opcode = OpCode::from_mnemonic(&mnemonic)
                .ok_or_else(|| RvmError::new(ErrorKind::SyntaxError, pos.clone(), raw.clone(), format!("unknown opcode '{mnemonic}'")))?;
            let info = opcode.info();
            let args = self.parse_args(&arg_src, &pos)?;
            if let crate::opcode::Arity::Exact(n) = info.arity {
                if args.len() != n {
                    return Err(RvmError::new(
                        ErrorKind::ArgumentNumberError,
                        pos.clone(),
                        raw.clone(),
                        format!("{mnemonic} expects {n} argument(s), got {}", args.len()),
                    ));
                }
            }

            if opcode == OpCode::LINK {
                let target = args.first().and_then(Arg::name).map(str::to_string).or_else(|| match args.first().map(|a| &a.literal) {
                    Some(ArgLiteral::Str(s)) => Some(s.clone()),
                    _ => None,
                });
                let target = target
                    .ok_or_else(|| RvmError::new(ErrorKind::LinkError, pos.clone(), raw.clone(), "LINK requires a path"))?;
                let linked_path = self.base_dir.join(&target);
                let linked = Parser::parse_file(&linked_path)
                    .map_err(|e| RvmError::new(ErrorKind::LinkError, pos.clone(), raw.clone(), e.render_summary()))?;
                let top = stack.last_mut().unwrap();
                top.ins_set.ins.extend(linked.ins);
                continue;
            }

            let mut ins = Ins::new(pos.clone(), opcode, args, raw.clone());

            if info.has_scope {
                self.label_counter += 1;
                let prefix = format!("{mnemonic}-{}-", self.label_counter);
                stack.last_mut().unwrap().ins_set.ins.push(ins);
                stack.push(OpenScope {
                    ins_set: InsSet {
                        is_delayed_scope: info.delayed_release,
                        scope_prefix: prefix.clone(),
                        scope_leader: raw.clone(),
                        leader_pos: pos,
                        ..Default::default()
                    },
                    label_prefix: prefix,
                });
                continue;
            }

            ins.extension_tag = None;
            stack.last_mut().unwrap().ins_set.ins.push(ins);
        }

        if stack.len() != 1 {
            return Err(RvmError::new(ErrorKind::SyntaxError, Pos::unknown(), "", "unclosed scope at end of file"));
        }
        Ok(stack.pop().unwrap().ins_set)
    }

    fn parse_args(&self, arg_src: &str, pos: &Pos) -> Result<Vec<Arg>, RvmError> {
        if arg_src.trim().is_empty() {
            return Ok(Vec::new());
        }
        split_args(arg_src)
            .into_iter()
            .map(|raw| classify_literal(&raw, pos))
            .collect()
    }
}

/// Splits source into logical lines: trims, joins `~`-continuation lines,
/// and strips `;` comments outside string literals.
fn preprocess(source: &str) -> Vec<(u32, String)> {
    let mut out: Vec<(u32, String)> = Vec::new();
    for (i, raw_line) in source.lines().enumerate() {
        let line_no = (i + 1) as u32;
        let stripped = strip_comment(raw_line).trim().to_string();
        if stripped.is_empty() {
            continue;
        }
        if let Some(continuation) = stripped.strip_prefix('~') {
            if let Some(last) = out.last_mut() {
                last.1.push_str(continuation.trim());
                continue;
            }
        }
        out.push((line_no, stripped));
    }
    out
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in line.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn split_instruction(line: &str, pos: &Pos) -> Result<(String, String), RvmError> {
    let colon = line
        .find(':')
        .ok_or_else(|| RvmError::new(ErrorKind::SyntaxError, pos.clone(), line.to_string(), "missing ':' separating opcode and arguments"))?;
    let mnemonic = line[..colon].trim().to_string();
    let args = line[colon + 1..].trim().to_string();
    Ok((mnemonic, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hello_world() {
        let mut parser = Parser::new(None, ".");
        let set = parser.parse(r#"SOUT : s-l, "Hello, world!\n""#).unwrap();
        assert_eq!(set.ins.len(), 1);
        assert_eq!(set.ins[0].opcode, OpCode::SOUT);
    }

    #[test]
    fn repeat_body_closes_into_nested_inset_and_outer_end_marker() {
        let mut parser = Parser::new(None, ".");
        let src = "ALLOT : i\nREPEAT : 9, i\n  ADD : a, b, t\nEND : REPEAT\n";
        let set = parser.parse(src).unwrap();
        assert_eq!(set.ins.len(), 3);
        assert_eq!(set.ins[1].opcode, OpCode::REPEAT);
        assert!(set.ins[1].body.is_some());
        assert_eq!(set.ins[2].opcode, END_MARKER_OPCODE);
        assert!(set.label_index("REPEAT-1-END").is_some());
    }

    #[test]
    fn missing_colon_is_a_syntax_error() {
        let mut parser = Parser::new(None, ".");
        assert_eq!(parser.parse("SOUT s-l").unwrap_err().kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn unclosed_scope_is_a_syntax_error() {
        let mut parser = Parser::new(None, ".");
        assert_eq!(parser.parse("REPEAT : 3\nADD : a, b, c\n").unwrap_err().kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn comment_and_continuation_are_honored() {
        let mut parser = Parser::new(None, ".");
        let set = parser.parse("SOUT : s-l, \"a\" ; trailing comment\n~ , \"b\"\n").unwrap();
        assert_eq!(set.ins.len(), 1);
        assert_eq!(set.ins[0].args.len(), 3);
    }
}
