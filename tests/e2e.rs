//! End-to-end scenarios across the front end and the interpreter.

mod util;

use ferroc::ast::{BinOp, ExprKind, Literal};
use ferroc::hygiene::Ident;
use ferroc::mir::interp::InterpreterThread;
use ferroc::mir::value::{AllocHandle, RelocTarget, Value};
use ferroc::mir::Path;
use ferroc::token::{CoreType, TokenKind};
use util::{expand_macro_to_expr, lex_kinds, load_mir, parse_macro_def};

#[test]
fn hello_tokens() {
    let toks = lex_kinds("let x: i32 = 0x2A;");
    assert_eq!(
        toks,
        vec![
            TokenKind::KwLet,
            TokenKind::Ident(Ident::plain("x")),
            TokenKind::Colon,
            TokenKind::Ident(Ident::plain("i32")),
            TokenKind::Eq,
            TokenKind::Integer {
                value: 42,
                suffix: CoreType::Any
            },
            TokenKind::Semicolon,
        ]
    );
}

#[test]
fn macro_addition_lite() {
    let def = parse_macro_def("macro_rules! m { ($a:expr, $b:expr) => { ($a) + ($b) } }");
    let e = expand_macro_to_expr(&def, "(2, 3)");
    match &e.kind {
        ExprKind::BinOp {
            op: BinOp::Add,
            left,
            right,
        } => {
            assert!(matches!(
                left.kind,
                ExprKind::Literal(Literal::Integer { value: 2, .. })
            ));
            assert!(matches!(
                right.kind,
                ExprKind::Literal(Literal::Integer { value: 3, .. })
            ));
        }
        other => panic!("expected addition, got {:?}", other),
    }
}

#[test]
fn nested_repetition_builds_pairs() {
    let def = parse_macro_def(
        "macro_rules! pairs { ($($a:ident : $b:expr),*) => { [$( ($a, $b) ),*] } }",
    );
    let e = expand_macro_to_expr(&def, "(x: 1, y: 2, z: 3)");
    match &e.kind {
        ExprKind::ArrayList(items) => {
            assert_eq!(items.len(), 3);
            for (i, item) in items.iter().enumerate() {
                match &item.kind {
                    ExprKind::Tuple(pair) => {
                        assert_eq!(pair.len(), 2);
                        assert!(matches!(pair[0].kind, ExprKind::NamedValue(_)));
                        match &pair[1].kind {
                            ExprKind::Literal(Literal::Integer { value, .. }) => {
                                assert_eq!(*value, (i + 1) as u128);
                            }
                            other => panic!("expected literal, got {:?}", other),
                        }
                    }
                    other => panic!("expected tuple, got {:?}", other),
                }
            }
        }
        other => panic!("expected array, got {:?}", other),
    }
}

#[test]
fn interpreter_addition() {
    let tree = load_mir(
        r#"
        fn ::"t"::add(a: i32, b: i32): i32 {
            0: {
                ASSIGN RETURN = BINOP arg0 + arg1;
                RETURN
            }
        }
        "#,
    );
    let path = Path::simple("t", &["add"]);
    let mut thread = InterpreterThread::new(&tree);
    let a = Value::from_bytes(&2i32.to_le_bytes());
    let b = Value::from_bytes(&3i32.to_le_bytes());
    thread.start(&path, vec![a, b]).unwrap();
    let v = thread.run().unwrap();
    let mut buf = [0u8; 4];
    v.read_bytes(0, &mut buf).unwrap();
    assert_eq!(i32::from_le_bytes(buf), 5);
}

#[test]
fn interpreter_pointers() {
    let tree = load_mir(
        r#"
        fn ::"t"::get(p: *const i32): i32 {
            0: {
                ASSIGN RETURN = =(*arg0);
                RETURN
            }
        }
        "#,
    );
    let cell = AllocHandle::alloc(4);
    cell.borrow_mut()
        .write_bytes(0, &7i32.to_le_bytes())
        .unwrap();
    let ptr = Value::new_pointer(0, RelocTarget::Alloc(cell));
    let path = Path::simple("t", &["get"]);
    let mut thread = InterpreterThread::new(&tree);
    thread.start(&path, vec![ptr]).unwrap();
    let v = thread.run().unwrap();
    let mut buf = [0u8; 4];
    v.read_bytes(0, &mut buf).unwrap();
    assert_eq!(i32::from_le_bytes(buf), 7);
}

#[test]
fn panic_catch_reports_status_and_payload() {
    let tree = load_mir(
        r#"
        fn ::"p"::raise(payload: usize): () = "_Unwind_RaiseException":"C";
        fn ::"t"::inner(d: usize): () {
            let x: usize;
            0: {
                ASSIGN x = 42 usize;
                CALL RETURN = ::"p"::raise(x) goto 1 else 2;
            }
            1: { RETURN }
            2: { DIVERGE }
        }
        fn ::"t"::start(): (i32, usize, ) {
            let status: i32;
            let out: usize;
            let pp: *mut usize;
            let dummy: usize;
            0: {
                ASSIGN out = 0 usize;
                ASSIGN dummy = 0 usize;
                ASSIGN pp = &mut out;
                CALL status = "try" (& ::"t"::inner, dummy, pp) goto 1 else 9;
            }
            1: {
                ASSIGN RETURN = (status, out, );
                RETURN
            }
            9: { DIVERGE }
        }
        type (i32, usize, ) { SIZE 16, ALIGN 8; 0 = i32; 8 = usize; }
        "#,
    );
    let entry = tree.find_entry().unwrap().clone();
    let mut thread = InterpreterThread::new(&tree);
    thread.start(&entry, vec![]).unwrap();
    let v = thread.run().unwrap();
    let mut status = [0u8; 4];
    v.read_bytes(0, &mut status).unwrap();
    assert_eq!(i32::from_le_bytes(status), 1);
    assert_eq!(v.read_usize(8).unwrap(), 42);
}
