//! Interpreter execution: stepping, calls, control flow, panics.

mod util;

use ferroc::mir::interp::InterpreterThread;
use ferroc::mir::value::{AllocHandle, RelocTarget, Value};
use ferroc::mir::{EvalError, Path};
use util::load_mir;

fn run_start(src: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    let tree = load_mir(src);
    let entry = tree.find_entry().expect("entry present").clone();
    let mut thread = InterpreterThread::new(&tree);
    thread.start(&entry, args)?;
    thread.run()
}

fn read_i32(v: &Value) -> i32 {
    let mut buf = [0u8; 4];
    v.read_bytes(0, &mut buf).expect("return value readable");
    i32::from_le_bytes(buf)
}

#[test]
fn constant_return_reaches_the_root_slot() {
    let v = run_start(
        r#"
        fn ::"t"::start(): i32 {
            0: {
                ASSIGN RETURN = 42 i32;
                RETURN
            }
        }
        "#,
        vec![],
    )
    .unwrap();
    assert_eq!(read_i32(&v), 42);
}

#[test]
fn call_passes_arguments_and_returns() {
    let v = run_start(
        r#"
        fn ::"t"::add(a: i32, b: i32): i32 {
            0: {
                ASSIGN RETURN = BINOP arg0 + arg1;
                RETURN
            }
        }
        fn ::"t"::start(): i32 {
            let x: i32;
            let y: i32;
            0: {
                ASSIGN x = 2 i32;
                ASSIGN y = 3 i32;
                CALL RETURN = ::"t"::add(x, y) goto 1 else 2;
            }
            1: { RETURN }
            2: { DIVERGE }
        }
        "#,
        vec![],
    )
    .unwrap();
    assert_eq!(read_i32(&v), 5);
}

#[test]
fn pointer_argument_dereferences_through_relocation() {
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
    cell.borrow_mut().write_bytes(0, &7i32.to_le_bytes()).unwrap();
    let ptr = Value::new_pointer(0, RelocTarget::Alloc(cell));

    let path = Path::simple("t", &["get"]);
    let mut thread = InterpreterThread::new(&tree);
    thread.start(&path, vec![ptr]).unwrap();
    let v = thread.run().unwrap();
    assert_eq!(read_i32(&v), 7);
}

#[test]
fn if_terminator_selects_blocks() {
    let v = run_start(
        r#"
        fn ::"t"::start(): i32 {
            let c: bool;
            0: {
                ASSIGN c = true;
                IF c goto 1 else 2
            }
            1: { ASSIGN RETURN = 10 i32; RETURN }
            2: { ASSIGN RETURN = 20 i32; RETURN }
        }
        "#,
        vec![],
    )
    .unwrap();
    assert_eq!(read_i32(&v), 10);
}

#[test]
fn switchval_matches_values_and_default() {
    let src = r#"
        fn ::"t"::pick(n: usize): i32 {
            0: { SWITCHVAL arg0 { 1 goto 1, 5 goto 2, _ goto 3 } }
            1: { ASSIGN RETURN = 11 i32; RETURN }
            2: { ASSIGN RETURN = 55 i32; RETURN }
            3: { ASSIGN RETURN = 99 i32; RETURN }
        }
        "#;
    let tree = load_mir(src);
    let path = Path::simple("t", &["pick"]);
    for (input, expect) in [(1u64, 11), (5, 55), (17, 99)] {
        let mut thread = InterpreterThread::new(&tree);
        thread
            .start(&path, vec![Value::new_usize(input)])
            .unwrap();
        assert_eq!(read_i32(&thread.run().unwrap()), expect);
    }
}

#[test]
fn enum_switch_reads_tag_bytes() {
    let src = r#"
        type ::"t"::E { SIZE 4, ALIGN 4; 0 = i32; 0 = i32; [0] = "\0\0\0\0"; [1] = "\x01\0\0\0"; }
        fn ::"t"::pick(e: ::"t"::E): i32 {
            0: { SWITCH arg0 { 1, 2 } }
            1: { ASSIGN RETURN = 10 i32; RETURN }
            2: { ASSIGN RETURN = 20 i32; RETURN }
        }
        "#;
    let tree = load_mir(src);
    let path = Path::simple("t", &["pick"]);
    for (tag, expect) in [(0i32, 10), (1, 20)] {
        let mut arg = Value::new_direct(4);
        arg.write_bytes(0, &tag.to_le_bytes()).unwrap();
        let mut thread = InterpreterThread::new(&tree);
        thread.start(&path, vec![arg]).unwrap();
        assert_eq!(read_i32(&thread.run().unwrap()), expect);
    }
}

#[test]
fn overflow_binop_writes_value_and_flag() {
    let v = run_start(
        r#"
        fn ::"t"::start(): (i32, bool, ) {
            let a: i32;
            let b: i32;
            0: {
                ASSIGN a = 2147483647 i32;
                ASSIGN b = 1 i32;
                ASSIGN RETURN = BINOP a +^ b;
                RETURN
            }
        }
        type (i32, bool, ) { SIZE 8, ALIGN 4; 0 = i32; 4 = bool; }
        "#,
        vec![],
    )
    .unwrap();
    let mut flag = [0u8; 1];
    v.read_bytes(4, &mut flag).unwrap();
    assert_eq!(flag[0], 1);
}

#[test]
fn drop_flags_gate_drop_statements() {
    // Dropping marks the slot undefined; the flag-guarded drop is skipped.
    let v = run_start(
        r#"
        fn ::"t"::start(): i32 {
            let a: i32;
            let b: i32;
            let fa = 1;
            let fb = 0;
            0: {
                ASSIGN a = 1 i32;
                ASSIGN b = 2 i32;
                DROP a IF fa;
                DROP b IF fb;
                ASSIGN RETURN = =b;
                RETURN
            }
        }
        "#,
        vec![],
    )
    .unwrap();
    assert_eq!(read_i32(&v), 2);
}

#[test]
fn dropped_locals_become_undefined() {
    let err = run_start(
        r#"
        fn ::"t"::start(): i32 {
            let a: i32;
            0: {
                ASSIGN a = 1 i32;
                DROP a;
                ASSIGN RETURN = =a;
                RETURN
            }
        }
        "#,
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::UndefinedRead { .. }));
}

#[test]
fn extern_shims_resolve_by_declaration() {
    let v = run_start(
        r#"
        fn ::"t"::compare(a: *const u8, b: *const u8, n: usize): i32 = "memcmp":"C";
        static ::"t"::A: [u8; 3] = "abc";
        static ::"t"::B: [u8; 3] = "abd";
        fn ::"t"::start(): i32 {
            let pa: *const u8;
            let pb: *const u8;
            let n: usize;
            0: {
                ASSIGN pa = & ::"t"::A;
                ASSIGN pb = & ::"t"::B;
                ASSIGN n = 3 usize;
                CALL RETURN = ::"t"::compare(pa, pb, n) goto 1 else 2;
            }
            1: { RETURN }
            2: { DIVERGE }
        }
        "#,
        vec![],
    )
    .unwrap();
    assert_eq!(read_i32(&v), -1);
}

#[test]
fn allocator_externs_produce_usable_memory() {
    let v = run_start(
        r#"
        fn ::"t"::start(): i32 {
            let p: *mut u8;
            let sz: usize;
            let al: usize;
            0: {
                ASSIGN sz = 16 usize;
                ASSIGN al = 8 usize;
                CALL p = ::"alloc"::__rust_alloc(sz, al) goto 1 else 9;
            }
            1: {
                ASSIGN *p = 77 u8;
                ASSIGN RETURN = CAST (*p) as i32;
                RETURN
            }
            9: { DIVERGE }
        }
        "#,
        vec![],
    )
    .unwrap();
    assert_eq!(read_i32(&v), 77);
}

#[test]
fn uncaught_panic_exits_with_error() {
    let err = run_start(
        r#"
        fn ::"p"::raise(payload: usize): () = "_Unwind_RaiseException":"C";
        fn ::"t"::start(): i32 {
            let x: usize;
            0: {
                ASSIGN x = 9 usize;
                CALL RETURN = ::"p"::raise(x) goto 1 else 2;
            }
            1: { ASSIGN RETURN = 0 i32; RETURN }
            2: { DIVERGE }
        }
        "#,
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Panicked));
}

#[test]
fn panic_inside_try_is_caught_with_payload() {
    let v = run_start(
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
        fn ::"t"::start(): i32 {
            let status: i32;
            let out: usize;
            let pp: *mut usize;
            let dummy: usize;
            let st: usize;
            let hundred: usize;
            let sum: usize;
            0: {
                ASSIGN out = 0 usize;
                ASSIGN dummy = 0 usize;
                ASSIGN pp = &mut out;
                CALL status = "try" (& ::"t"::inner, dummy, pp) goto 1 else 9;
            }
            1: {
                ASSIGN st = CAST status as usize;
                ASSIGN hundred = 100 usize;
                ASSIGN sum = BINOP st * hundred;
                ASSIGN sum = BINOP sum + out;
                ASSIGN RETURN = CAST sum as i32;
                RETURN
            }
            9: { DIVERGE }
        }
        "#,
        vec![],
    )
    .unwrap();
    // Status 1 and payload 42.
    assert_eq!(read_i32(&v), 142);
}

#[test]
fn missing_intrinsic_and_extern_fail_loudly() {
    let err = run_start(
        r#"
        fn ::"t"::start(): i32 {
            let x: i32;
            0: {
                CALL x = "definitely_not_real" () goto 1 else 2;
            }
            1: { ASSIGN RETURN = =x; RETURN }
            2: { DIVERGE }
        }
        "#,
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::MissingIntrinsic(_)));

    let err = run_start(
        r#"
        fn ::"t"::mystery(): i32 = "not_a_real_symbol":"C";
        fn ::"t"::start(): i32 {
            0: {
                CALL RETURN = ::"t"::mystery() goto 1 else 2;
            }
            1: { RETURN }
            2: { DIVERGE }
        }
        "#,
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::MissingExtern(_)));
}

#[test]
fn function_pointers_call_through_relocations() {
    let v = run_start(
        r#"
        fn ::"t"::seven(): i32 {
            0: { ASSIGN RETURN = 7 i32; RETURN }
        }
        fn ::"t"::start(): i32 {
            let f: fn() -> i32;
            0: {
                ASSIGN f = & ::"t"::seven;
                CALL RETURN = (f) () goto 1 else 2;
            }
            1: { RETURN }
            2: { DIVERGE }
        }
        "#,
        vec![],
    )
    .unwrap();
    assert_eq!(read_i32(&v), 7);
}

#[test]
fn composite_construction_and_field_projection() {
    let v = run_start(
        r#"
        type ::"t"::Pair { SIZE 8, ALIGN 4; 0 = i32; 4 = i32; }
        fn ::"t"::start(): i32 {
            let p: ::"t"::Pair;
            0: {
                ASSIGN p = { 3 i32, 4 i32 }: ::"t"::Pair;
                ASSIGN RETURN = BINOP p.0 + p.1;
                RETURN
            }
        }
        "#,
        vec![],
    )
    .unwrap();
    assert_eq!(read_i32(&v), 7);
}

#[test]
fn sized_arrays_and_indexing() {
    let v = run_start(
        r#"
        fn ::"t"::start(): i32 {
            let a: [i32; 4];
            let i: usize;
            0: {
                ASSIGN a = [5 i32; 4];
                ASSIGN i = 2 usize;
                ASSIGN a[i] = 9 i32;
                ASSIGN RETURN = =a[i];
                RETURN
            }
        }
        "#,
        vec![],
    )
    .unwrap();
    assert_eq!(read_i32(&v), 9);
}

#[test]
fn borrow_and_deref_round_trip() {
    let v = run_start(
        r#"
        fn ::"t"::start(): i32 {
            let x: i32;
            let p: &i32;
            0: {
                ASSIGN x = 31 i32;
                ASSIGN p = & x;
                ASSIGN RETURN = =*p;
                RETURN
            }
        }
        "#,
        vec![],
    )
    .unwrap();
    assert_eq!(read_i32(&v), 31);
}
