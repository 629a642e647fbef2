//! `InsSet`/`Ins`/`Arg`/`Pos` ↔ RSI binary, profile-gated.
//!
//! `[header][extension list][root InsSet]`. The header (magic + profile +
//! version) is present for every profile except *Minified*, which omits it
//! outright — a reader must be told the profile out of band to parse one.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use binrw::{BinReaderExt, BinWriterExt};

use crate::instruction::{Arg, ArgKind, ArgLiteral, Ins, InsSet, Pos};
use crate::opcode::OpCode;

const MAGIC: u32 = 0x5253_4931;

/// Serialization verbosity tier, increasing restriction Debug → Minified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Profile {
    Debug,
    Testing,
    Release,
    Minified,
}

impl Profile {
    fn as_u8(self) -> u8 {
        match self {
            Profile::Debug => 0,
            Profile::Testing => 1,
            Profile::Release => 2,
            Profile::Minified => 3,
        }
    }

    fn from_u8(b: u8) -> Result<Profile, SerializerError> {
        Ok(match b {
            0 => Profile::Debug,
            1 => Profile::Testing,
            2 => Profile::Release,
            3 => Profile::Minified,
            other => return Err(SerializerError::Corrupt(format!("unknown profile byte {other}"))),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SerializerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("binary codec error: {0}")]
    Codec(#[from] binrw::Error),
    #[error("cannot determine serialization profile without out-of-band knowledge")]
    AmbiguousProfile,
    #[error("unknown opcode mnemonic '{0}' in RSI stream")]
    UnknownMnemonic(String),
    #[error("corrupt RSI stream: {0}")]
    Corrupt(String),
}

pub struct Serializer;

impl Serializer {
    pub fn write(root: &InsSet, profile: Profile, extensions: &[String]) -> Result<Vec<u8>, SerializerError> {
        let mut cursor = Cursor::new(Vec::new());
        if profile != Profile::Minified {
            cursor.write_le(&MAGIC)?;
            cursor.write_le(&profile.as_u8())?;
            cursor.write_le(&1u32)?;
        }
        write_string_list(&mut cursor, extensions)?;
        write_ins_set(&mut cursor, root, profile, false)?;
        Ok(cursor.into_inner())
    }

    pub fn read(bytes: &[u8], hint: Option<Profile>) -> Result<(InsSet, Vec<String>), SerializerError> {
        let mut cursor = Cursor::new(bytes);
        let profile = if bytes.len() >= 4 && u32::from_le_bytes(bytes[0..4].try_into().unwrap()) == MAGIC {
            cursor.seek(SeekFrom::Start(4))?;
            let p: u8 = cursor.read_le()?;
            let _version: u32 = cursor.read_le()?;
            Profile::from_u8(p)?
        } else {
            hint.ok_or(SerializerError::AmbiguousProfile)?
        };
        let extensions = read_string_list(&mut cursor)?;
        let root = read_ins_set(&mut cursor, profile, false)?;
        Ok((root, extensions))
    }
}

fn write_string(cursor: &mut Cursor<Vec<u8>>, s: &str) -> Result<(), SerializerError> {
    cursor.write_le(&(s.len() as u32))?;
    cursor.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String, SerializerError> {
    let len: u32 = cursor.read_le()?;
    let mut buf = vec![0u8; len as usize];
    cursor.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| SerializerError::Corrupt(e.to_string()))
}

fn write_string_list(cursor: &mut Cursor<Vec<u8>>, items: &[String]) -> Result<(), SerializerError> {
    cursor.write_le(&(items.len() as u32))?;
    for item in items {
        write_string(cursor, item)?;
    }
    Ok(())
}

fn read_string_list(cursor: &mut Cursor<&[u8]>) -> Result<Vec<String>, SerializerError> {
    let count: u32 = cursor.read_le()?;
    (0..count).map(|_| read_string(cursor)).collect()
}

fn write_pos(cursor: &mut Cursor<Vec<u8>>, pos: &Pos) -> Result<(), SerializerError> {
    cursor.write_le(&pos.line)?;
    match &pos.file {
        Some(f) => {
            cursor.write_le(&1u8)?;
            write_string(cursor, f)?;
        }
        None => cursor.write_le(&0u8)?,
    }
    Ok(())
}

fn read_pos(cursor: &mut Cursor<&[u8]>) -> Result<Pos, SerializerError> {
    let line: u32 = cursor.read_le()?;
    let has_file: u8 = cursor.read_le()?;
    let file = if has_file == 1 { Some(read_string(cursor)?) } else { None };
    Ok(Pos::new(line, file))
}

fn write_arg(cursor: &mut Cursor<Vec<u8>>, arg: &Arg) -> Result<(), SerializerError> {
    write_pos(cursor, &arg.pos)?;
    let kind = match arg.kind {
        ArgKind::Identifier => 0u8,
        ArgKind::Keyword => 1,
        ArgKind::Number => 2,
        ArgKind::String => 3,
        ArgKind::Unknown => 4,
    };
    cursor.write_le(&kind)?;
    match &arg.literal {
        ArgLiteral::Name(n) => {
            cursor.write_le(&0u8)?;
            write_string(cursor, n)?;
        }
        ArgLiteral::Int(i) => {
            cursor.write_le(&1u8)?;
            cursor.write_le(i)?;
        }
        ArgLiteral::Float(f) => {
            cursor.write_le(&2u8)?;
            cursor.write_le(f)?;
        }
        ArgLiteral::Str(s) => {
            cursor.write_le(&3u8)?;
            write_string(cursor, s)?;
        }
    }
    Ok(())
}

fn read_arg(cursor: &mut Cursor<&[u8]>) -> Result<Arg, SerializerError> {
    let pos = read_pos(cursor)?;
    let kind_byte: u8 = cursor.read_le()?;
    let kind = match kind_byte {
        0 => ArgKind::Identifier,
        1 => ArgKind::Keyword,
        2 => ArgKind::Number,
        3 => ArgKind::String,
        _ => ArgKind::Unknown,
    };
    let literal_tag: u8 = cursor.read_le()?;
    let literal = match literal_tag {
        0 => ArgLiteral::Name(read_string(cursor)?),
        1 => ArgLiteral::Int(cursor.read_le()?),
        2 => ArgLiteral::Float(cursor.read_le()?),
        3 => ArgLiteral::Str(read_string(cursor)?),
        other => return Err(SerializerError::Corrupt(format!("unknown arg literal tag {other}"))),
    };
    Ok(Arg { pos, kind, literal })
}

fn write_ins(cursor: &mut Cursor<Vec<u8>>, ins: &Ins, profile: Profile) -> Result<(), SerializerError> {
    write_pos(cursor, &ins.pos)?;
    write_string(cursor, ins.opcode.info().mnemonic)?;
    cursor.write_le(&(ins.args.len() as u32))?;
    for arg in &ins.args {
        write_arg(cursor, arg)?;
    }
    match &ins.body {
        Some(body) => {
            cursor.write_le(&1u8)?;
            write_ins_set(cursor, body, profile, body.is_delayed_scope)?;
        }
        None => cursor.write_le(&0u8)?,
    }
    if profile < Profile::Testing {
        cursor.write_le(&1u8)?;
        write_string(cursor, &ins.raw_src)?;
    } else {
        cursor.write_le(&0u8)?;
    }
    let delayed = ins.body.as_ref().map(|b| b.is_delayed_scope).unwrap_or(false);
    cursor.write_le(&(delayed as u8))?;
    match &ins.extension_tag {
        Some(tag) => {
            cursor.write_le(&1u8)?;
            write_string(cursor, tag)?;
        }
        None => cursor.write_le(&0u8)?,
    }
    Ok(())
}

fn read_ins(cursor: &mut Cursor<&[u8]>, profile: Profile) -> Result<Ins, SerializerError> {
    let pos = read_pos(cursor)?;
    let mnemonic = read_string(cursor)?;
    let opcode = if mnemonic == crate::instruction::END_MARKER_OPCODE.info().mnemonic {
        crate::instruction::END_MARKER_OPCODE
    } else {
        OpCode::from_mnemonic(&mnemonic).ok_or(SerializerError::UnknownMnemonic(mnemonic))?
    };
    let arg_count: u32 = cursor.read_le()?;
    let mut args = Vec::with_capacity(arg_count as usize);
    for _ in 0..arg_count {
        args.push(read_arg(cursor)?);
    }
    let has_body: u8 = cursor.read_le()?;
    let body = if has_body == 1 { Some(read_ins_set(cursor, profile, false)?) } else { None };
    let has_raw: u8 = cursor.read_le()?;
    let raw_src = if has_raw == 1 { read_string(cursor)? } else { String::new() };
    let delayed: u8 = cursor.read_le()?;
    let body = body.map(|mut b| {
        b.is_delayed_scope = delayed == 1;
        b
    });
    let has_ext: u8 = cursor.read_le()?;
    let extension_tag = if has_ext == 1 { Some(read_string(cursor)?) } else { None };
    Ok(Ins { pos, opcode, args, body, raw_src, extension_tag })
}

fn write_ins_set(cursor: &mut Cursor<Vec<u8>>, set: &InsSet, profile: Profile, _is_delayed: bool) -> Result<(), SerializerError> {
    if profile < Profile::Testing {
        cursor.write_le(&1u8)?;
        write_string(cursor, &set.scope_prefix)?;
        write_string(cursor, &set.scope_leader)?;
    } else {
        cursor.write_le(&0u8)?;
    }
    if profile < Profile::Release {
        cursor.write_le(&1u8)?;
        write_pos(cursor, &set.leader_pos)?;
    } else {
        cursor.write_le(&0u8)?;
    }
    cursor.write_le(&(set.labels.len() as u32))?;
    for (name, index) in &set.labels {
        write_string(cursor, name)?;
        cursor.write_le(&(*index as u32))?;
    }
    cursor.write_le(&(set.ins.len() as u32))?;
    for ins in &set.ins {
        write_ins(cursor, ins, profile)?;
    }
    Ok(())
}

fn read_ins_set(cursor: &mut Cursor<&[u8]>, profile: Profile, is_delayed: bool) -> Result<InsSet, SerializerError> {
    let has_debug_names: u8 = cursor.read_le()?;
    let (scope_prefix, scope_leader) =
        if has_debug_names == 1 { (read_string(cursor)?, read_string(cursor)?) } else { (String::new(), String::new()) };
    let has_leader_pos: u8 = cursor.read_le()?;
    let leader_pos = if has_leader_pos == 1 { read_pos(cursor)? } else { Pos::unknown() };
    let label_count: u32 = cursor.read_le()?;
    let mut labels = std::collections::HashMap::new();
    for _ in 0..label_count {
        let name = read_string(cursor)?;
        let index: u32 = cursor.read_le()?;
        labels.insert(name, index as usize);
    }
    let ins_count: u32 = cursor.read_le()?;
    let mut ins = Vec::with_capacity(ins_count as usize);
    for _ in 0..ins_count {
        ins.push(read_ins(cursor, profile)?);
    }
    Ok(InsSet { is_delayed_scope: is_delayed, scope_prefix, scope_leader, leader_pos, ins, labels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn round_trips_under_debug_profile() {
        let mut parser = Parser::new(None, ".");
        let set = parser.parse(r#"SOUT : s-l, "Hello, world!\n""#).unwrap();
        let bytes = Serializer::write(&set, Profile::Debug, &[]).unwrap();
        let (back, exts) = Serializer::read(&bytes, None).unwrap();
        assert!(exts.is_empty());
        assert_eq!(back.ins.len(), set.ins.len());
        assert_eq!(back.ins[0].opcode, set.ins[0].opcode);
        assert_eq!(back.ins[0].raw_src, set.ins[0].raw_src);
    }

    #[test]
    fn release_profile_drops_scope_leader_pos_but_keeps_structure() {
        let mut parser = Parser::new(None, ".");
        let set = parser.parse("REPEAT : 3\nADD : a, b, c\nEND : REPEAT\n").unwrap();
        let bytes = Serializer::write(&set, Profile::Release, &[]).unwrap();
        let (back, _) = Serializer::read(&bytes, None).unwrap();
        assert_eq!(back.ins.len(), set.ins.len());
        assert!(back.ins[0].body.is_some());
    }

    #[test]
    fn minified_profile_requires_a_hint_to_read_back() {
        let mut parser = Parser::new(None, ".");
        let set = parser.parse(r#"SOUT : s-l, "hi""#).unwrap();
        let bytes = Serializer::write(&set, Profile::Minified, &[]).unwrap();
        assert!(matches!(Serializer::read(&bytes, None), Err(SerializerError::AmbiguousProfile)));
        let (back, _) = Serializer::read(&bytes, Some(Profile::Minified)).unwrap();
        assert_eq!(back.ins.len(), 1);
    }
}
