//! Memory model: validity bitmaps and relocation behaviour, including the
//! intrinsic-level copies.

use ferroc::mir::interp::{CallCtx, ThreadState};
use ferroc::mir::intrinsics::call_intrinsic;
use ferroc::mir::module::ModuleTree;
use ferroc::mir::value::{AllocHandle, RelocTarget, Value};
use ferroc::mir::{EvalError, RawType, TypeRef};

fn ptr_into(alloc: &AllocHandle, ofs: u64) -> Value {
    Value::new_pointer(ofs, RelocTarget::Alloc(alloc.clone()))
}

#[test]
fn partial_pointer_read_is_undefined_whole_read_carries_relocation() {
    let a = AllocHandle::alloc(16);
    let target = AllocHandle::alloc(4);
    a.borrow_mut()
        .write_ptr(0, 0, RelocTarget::Alloc(target.clone()))
        .unwrap();

    // Bytes 0-3: partial pointer read.
    let err = a.borrow().read_value(0, 4).unwrap_err();
    assert!(matches!(err, EvalError::PartialPointerRead { .. }));

    // Bytes 0-8: the relocation is preserved.
    let v = a.borrow().read_value(0, 8).unwrap();
    let reloc = v.get_relocation(0).expect("relocation carried");
    assert!(reloc.as_alloc().unwrap().ptr_eq(&target));
}

#[test]
fn copy_nonoverlapping_carries_relocations_and_is_independent() {
    let tree = ModuleTree::new();
    let mut thread = ThreadState::new();
    let mut ctx = CallCtx {
        tree: &tree,
        thread: &mut thread,
    };

    let src = AllocHandle::alloc(8);
    let dst = AllocHandle::alloc(8);
    let target = AllocHandle::alloc(4);
    src.borrow_mut()
        .write_ptr(0, 0, RelocTarget::Alloc(target.clone()))
        .unwrap();

    // copy_nonoverlapping::<u8>(src, dst, 8)
    let args = vec![ptr_into(&src, 0), ptr_into(&dst, 0), Value::new_usize(8)];
    call_intrinsic(
        &mut ctx,
        "copy_nonoverlapping",
        &[TypeRef::from_raw(RawType::U8)],
        args,
    )
    .unwrap();

    let copied = dst.borrow().get_relocation(0).expect("relocation copied");
    assert!(copied.as_alloc().unwrap().ptr_eq(&target));

    // Overwriting the source afterwards does not disturb the copy.
    src.borrow_mut().write_bytes(0, &[0u8; 8]).unwrap();
    assert!(src.borrow().get_relocation(0).is_none());
    assert!(dst.borrow().get_relocation(0).is_some());
}

#[test]
fn write_bytes_across_a_relocation_removes_it() {
    let tree = ModuleTree::new();
    let mut thread = ThreadState::new();
    let mut ctx = CallCtx {
        tree: &tree,
        thread: &mut thread,
    };

    let a = AllocHandle::alloc(16);
    let target = AllocHandle::alloc(4);
    a.borrow_mut()
        .write_ptr(4, 0, RelocTarget::Alloc(target))
        .unwrap();

    // write_bytes::<u8>(a+0, 0, 8) spans the relocation at offset 4.
    let args = vec![ptr_into(&a, 0), Value::new_u64(0, 1), Value::new_usize(8)];
    call_intrinsic(
        &mut ctx,
        "write_bytes",
        &[TypeRef::from_raw(RawType::U8)],
        args,
    )
    .unwrap();

    assert!(a.borrow().get_relocation(4).is_none());
    let mut buf = [0xFFu8; 8];
    a.borrow().read_bytes(0, &mut buf).unwrap();
    assert_eq!(buf, [0u8; 8]);
}

#[test]
fn offset_intrinsic_scales_and_keeps_relocation() {
    let tree = ModuleTree::new();
    let mut thread = ThreadState::new();
    let mut ctx = CallCtx {
        tree: &tree,
        thread: &mut thread,
    };

    let a = AllocHandle::alloc(64);
    let ptr = ptr_into(&a, 8);
    let out = call_intrinsic(
        &mut ctx,
        "offset",
        &[TypeRef::from_raw(RawType::U32)],
        vec![ptr, Value::new_u64(3, 8)],
    )
    .unwrap();
    assert_eq!(out.read_usize(0).unwrap(), 8 + 3 * 4);
    assert!(out.get_relocation(0).is_some());
}

#[test]
fn undefined_reads_are_rejected_via_pointers() {
    let a = AllocHandle::alloc(8);
    a.borrow_mut().write_bytes(0, &[1, 2]).unwrap();
    assert!(a.borrow().read_value(0, 2).is_ok());
    let err = a.borrow().check_bytes_valid(0, 4).unwrap_err();
    assert!(matches!(err, EvalError::UndefinedRead { .. }));
}

#[test]
fn realloc_preserves_prefix_and_clips() {
    let a = AllocHandle::alloc(8);
    a.borrow_mut().write_bytes(0, &[9; 8]).unwrap();
    a.borrow_mut().resize(16);
    // The old prefix is intact, the extension is undefined.
    assert!(a.borrow().check_bytes_valid(0, 8).is_ok());
    assert!(a.borrow().check_bytes_valid(8, 8).is_err());
    a.borrow_mut().resize(4);
    assert_eq!(a.borrow().size(), 4);
}
