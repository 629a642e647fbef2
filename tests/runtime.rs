//! End-to-end RA programs: the scenarios from spec.md §8, run through the
//! public `rvm` API exactly as `--run` would.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use rvm::dispatcher::{Dispatcher, Flow};
use rvm::host::Console;
use rvm::parser::Parser;

#[derive(Default)]
struct CapturingConsole {
    out: Rc<RefCell<String>>,
}

impl Console for CapturingConsole {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.out.borrow_mut().push_str(text);
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<String> {
        Ok(String::new())
    }
}

fn run(src: &str) -> String {
    let mut parser = Parser::new(None, ".");
    let ins_set = parser.parse(src).expect("parse failed");
    let out = Rc::new(RefCell::new(String::new()));
    let mut disp = Dispatcher::new(".");
    disp.console = Box::new(CapturingConsole { out: out.clone() });
    let result = disp.execute(&ins_set);
    drop(disp);
    match result {
        Ok(Flow::Normal) => {}
        other => panic!("unexpected flow: {}", other.err().map(|e| e.render_full()).unwrap_or_default()),
    }
    Rc::try_unwrap(out).unwrap().into_inner()
}

#[test]
fn hello_world() {
    let out = run(r#"SOUT : s-l, "Hello, world!\n""#);
    assert_eq!(out, "Hello, world!\n");
}

#[test]
fn fibonacci_ten_by_repeat() {
    let src = "\
ALLOT : a, b, t, i
TP_SET : tp-int, a
TP_SET : tp-int, b
PUT : 0, a
PUT : 1, b
REPEAT : 9, i
  ADD : a, b, t
  PUT : b, a
  PUT : t, b
END : REPEAT
SOUT : s-m, b
";
    assert_eq!(run(src), "55\n");
}

#[test]
fn try_detect_matches_by_type_hierarchy() {
    let src = "\
TP_DEF : E
TP_DEF : E2, E
ALLOT : inst
ATMP :
  TP_NEW : E2, inst
  EXPOSE : inst
  DETECT : E, eslot
    SOUT : s-l, \"caught\\n\"
  END : DETECT
END : ATMP
SOUT : s-l, \"resumed\\n\"
";
    assert_eq!(run(src), "caught\nresumed\n");
}

#[test]
fn function_with_return() {
    let src = "\
FUNI : square, x
  ALLOT : r
  MUL : x, x, r
  RET : r
END : FUNI
ALLOT : out
IVOK : square, 7, out
SOUT : s-m, out
";
    assert_eq!(run(src), "49\n");
}

#[test]
fn quote_coherence() {
    let src = "\
ALLOT : x, q
PUT : 10, x
QOT : x, q
QOT_VAL : 42, q
SOUT : s-m, x
";
    assert_eq!(run(src), "42\n");
}

#[test]
fn round_trip_serialization_matches_direct_execution() {
    use rvm::serializer::{Profile, Serializer};

    let src = "\
ALLOT : a, b, t, i
TP_SET : tp-int, a
TP_SET : tp-int, b
PUT : 0, a
PUT : 1, b
REPEAT : 9, i
  ADD : a, b, t
  PUT : b, a
  PUT : t, b
END : REPEAT
SOUT : s-m, b
";
    let direct = run(src);

    let mut parser = Parser::new(None, ".");
    let ins_set = parser.parse(src).unwrap();
    let bytes = Serializer::write(&ins_set, Profile::Debug, &[]).unwrap();
    let (roundtripped, _extensions) = Serializer::read(&bytes, None).unwrap();

    let out = Rc::new(RefCell::new(String::new()));
    let mut disp = Dispatcher::new(".");
    disp.console = Box::new(CapturingConsole { out: out.clone() });
    disp.execute(&roundtripped).unwrap();
    drop(disp);
    let replayed = Rc::try_unwrap(out).unwrap().into_inner();

    assert_eq!(replayed, direct);
}

#[test]
fn try_detect_falls_through_on_type_mismatch() {
    let src = "\
TP_DEF : E
TP_DEF : Unrelated
ALLOT : inst
ATMP :
  TP_NEW : E, inst
  EXPOSE : inst
  DETECT : Unrelated, eslot
    SOUT : s-l, \"wrong handler\\n\"
  END : DETECT
END : ATMP
SOUT : s-l, \"unreachable\\n\"
";
    let mut parser = Parser::new(None, ".");
    let ins_set = parser.parse(src).unwrap();
    let mut disp = Dispatcher::new(".");
    match disp.execute(&ins_set) {
        Ok(Flow::Exposed(inst)) => {
            assert_eq!(inst.borrow().type_def.borrow().name, "E");
        }
        other => panic!("expected an uncaught Exposed flow, got a different outcome: {}", other.is_ok()),
    }
}
