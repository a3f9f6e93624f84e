//! Built-in intrinsic implementations.
//!
//! Dispatch is by name against a fixed set; an unknown intrinsic aborts the
//! interpreter with a structured TODO rather than silently passing.

use super::interp::{drop_value, variant_index, CallCtx};
use super::primitive::{Overflow, PrimitiveValue};
use super::value::{AllocHandle, RelocTarget, Value, ValueRef};
use super::{EResult, EvalError, RawType, TypeRef, TypeWrapper, POINTER_SIZE};

fn ptr_target(v: &Value) -> EResult<(AllocHandle, usize)> {
    let ofs = v.read_usize(0)? as usize;
    match v.get_relocation(0) {
        Some(RelocTarget::Alloc(a)) => Ok((a, ofs)),
        Some(_) => Err(EvalError::TypeError(
            "expected a data pointer argument".into(),
        )),
        None => Err(EvalError::MissingRelocation),
    }
}

/// Zero-extended integer argument of any width up to eight bytes.
fn int_arg(v: &Value) -> EResult<u64> {
    let size = v.size().min(8);
    let mut buf = [0u8; 8];
    v.read_bytes(0, &mut buf[..size])?;
    Ok(u64::from_le_bytes(buf))
}

fn prim_pair(ty: &TypeRef, a: &Value, b: &Value) -> EResult<(PrimitiveValue, PrimitiveValue)> {
    let ar = value_ref(a);
    let br = value_ref(b);
    Ok((
        PrimitiveValue::from_value(ty.inner, &ar)?,
        PrimitiveValue::from_value(ty.inner, &br)?,
    ))
}

fn value_ref(v: &Value) -> ValueRef {
    let mut c = v.clone();
    let alloc = c.create_allocation();
    let size = alloc.size();
    ValueRef::new(alloc, 0, size)
}

fn with_overflow(ty: &TypeRef, a: &Value, b: &Value, which: u8) -> EResult<Value> {
    let (ap, bp) = prim_pair(ty, a, b)?;
    let (v, ovf) = match which {
        0 => ap.add(&bp)?,
        1 => ap.subtract(&bp)?,
        _ => ap.multiply(&bp)?,
    };
    let bytes = v.to_le_bytes();
    let mut out = Value::new_direct(bytes.len() + 1);
    out.write_bytes(0, &bytes)?;
    out.write_bytes(bytes.len(), &[(ovf != Overflow::None) as u8])?;
    Ok(out)
}

fn param_size(ctx: &CallCtx<'_, '_>, params: &[TypeRef]) -> EResult<usize> {
    let ty = params
        .first()
        .ok_or_else(|| EvalError::TypeError("intrinsic needs a type parameter".into()))?;
    ty.size(ctx.tree)
        .ok_or_else(|| EvalError::TypeError(format!("unsized type parameter {}", ty)))
}

pub fn call_intrinsic(
    ctx: &mut CallCtx<'_, '_>,
    name: &str,
    params: &[TypeRef],
    args: Vec<Value>,
) -> EResult<Value> {
    // The atomic families are single-threaded emulations: plain reads and
    // writes, ordering suffixes ignored.
    if let Some(rest) = name.strip_prefix("atomic_") {
        let base = rest.split('_').next().unwrap_or(rest);
        return atomic_op(ctx, base, params, args);
    }

    match name {
        "size_of_val" => {
            let ty = &params[0];
            match ty.size(ctx.tree) {
                Some(s) => Ok(Value::new_usize(s as u64)),
                None => dyn_size_align(ctx, ty, &args[0], false),
            }
        }
        "min_align_of_val" => {
            let ty = &params[0];
            match align_of(ctx, ty) {
                Some(a) => Ok(Value::new_usize(a as u64)),
                None => dyn_size_align(ctx, ty, &args[0], true),
            }
        }
        "offset" | "arith_offset" => {
            let esz = param_size(ctx, params)? as i64;
            let base = args[0].read_usize(0)?;
            let count = int_arg(&args[1])? as i64;
            let new_ofs = (base as i64).wrapping_add(count.wrapping_mul(esz)) as u64;
            let mut out = args[0].clone();
            let reloc = out.get_relocation(0);
            out.write_usize(0, new_ofs)?;
            if let Some(r) = reloc {
                out.set_relocation(0, r);
            }
            Ok(out)
        }
        "copy_nonoverlapping" => {
            let total = param_size(ctx, params)? * int_arg(&args[2])? as usize;
            let (src, src_ofs) = ptr_target(&args[0])?;
            let (dst, dst_ofs) = ptr_target(&args[1])?;
            if total > 0 {
                let window = src.borrow().read_value(src_ofs, total)?;
                dst.borrow_mut().write_value(dst_ofs, &window)?;
            }
            Ok(Value::new_unit())
        }
        "write_bytes" => {
            let total = param_size(ctx, params)? * int_arg(&args[2])? as usize;
            let byte = int_arg(&args[1])? as u8;
            let (dst, dst_ofs) = ptr_target(&args[0])?;
            if total > 0 {
                dst.borrow_mut()
                    .write_bytes(dst_ofs, &vec![byte; total])?;
            }
            Ok(Value::new_unit())
        }
        "transmute" => {
            // The value is reinterpreted as-is; relocations ride along.
            let out = args.into_iter().next().expect("transmute takes a value");
            if params.len() >= 2 {
                if let Some(want) = params[1].size(ctx.tree) {
                    if want != out.size() {
                        return Err(EvalError::SizeMismatch {
                            expected: want,
                            got: out.size(),
                        });
                    }
                }
            }
            Ok(out)
        }
        "forget" | "assume" | "assert_inhabited" | "panic_if_uninhabited" => {
            Ok(Value::new_unit())
        }
        "likely" | "unlikely" => Ok(args.into_iter().next().unwrap_or_else(Value::new_unit)),
        "init" => {
            let size = param_size(ctx, params)?;
            let mut v = Value::new_direct(size);
            v.write_bytes(0, &vec![0; size])?;
            Ok(v)
        }
        "uninit" => Ok(Value::new_direct(param_size(ctx, params)?)),
        "move_val_init" => {
            let (dst, dst_ofs) = ptr_target(&args[0])?;
            dst.borrow_mut().write_value(dst_ofs, &args[1])?;
            Ok(Value::new_unit())
        }
        "drop_in_place" => {
            let ty = &params[0];
            let (alloc, ofs) = ptr_target(&args[0])?;
            let size = ty
                .size(ctx.tree)
                .unwrap_or_else(|| alloc.size().saturating_sub(ofs));
            let r = ValueRef::new(alloc, ofs, size);
            drop_value(ctx.tree, &r, ty, false)?;
            Ok(Value::new_unit())
        }
        "type_id" => {
            let id = ctx.thread.type_id_of(&params[0]);
            Ok(Value::new_u64(id, 8))
        }
        "type_name" => {
            let text = params[0].to_string();
            let alloc = AllocHandle::alloc(text.len());
            alloc.borrow_mut().write_bytes(0, text.as_bytes())?;
            let mut out = Value::new_direct(POINTER_SIZE * 2);
            let handle = out.create_allocation();
            handle
                .borrow_mut()
                .write_ptr(0, 0, RelocTarget::Alloc(alloc))?;
            handle
                .borrow_mut()
                .write_usize(POINTER_SIZE, text.len() as u64)?;
            Ok(out)
        }
        "discriminant_value" => {
            let ty = &params[0];
            let (alloc, ofs) = ptr_target(&args[0])?;
            let size = ty.size(ctx.tree).unwrap_or(alloc.size() - ofs);
            let r = ValueRef::new(alloc, ofs, size);
            let idx = variant_index(ctx.tree, &r, ty)?;
            Ok(Value::new_u64(idx as u64, 8))
        }
        "add_with_overflow" => with_overflow(&params[0], &args[0], &args[1], 0),
        "sub_with_overflow" => with_overflow(&params[0], &args[0], &args[1], 1),
        "mul_with_overflow" => with_overflow(&params[0], &args[0], &args[1], 2),
        "overflowing_add" | "wrapping_add" => {
            let (a, b) = prim_pair(&params[0], &args[0], &args[1])?;
            Ok(Value::from_bytes(&a.add(&b)?.0.to_le_bytes()))
        }
        "overflowing_sub" | "wrapping_sub" | "unchecked_sub" => {
            let (a, b) = prim_pair(&params[0], &args[0], &args[1])?;
            Ok(Value::from_bytes(&a.subtract(&b)?.0.to_le_bytes()))
        }
        "saturating_add" => {
            let (a, b) = prim_pair(&params[0], &args[0], &args[1])?;
            let (v, ovf) = a.add(&b)?;
            Ok(Value::from_bytes(&saturate(v, ovf).to_le_bytes()))
        }
        "saturating_sub" => {
            let (a, b) = prim_pair(&params[0], &args[0], &args[1])?;
            let (v, ovf) = a.subtract(&b)?;
            Ok(Value::from_bytes(&saturate(v, ovf).to_le_bytes()))
        }
        "exact_div" => {
            let (a, b) = prim_pair(&params[0], &args[0], &args[1])?;
            Ok(Value::from_bytes(&a.divide(&b)?.to_le_bytes()))
        }
        "ctpop" => {
            let size = args[0].size();
            let mut buf = vec![0u8; size];
            args[0].read_bytes(0, &mut buf)?;
            let ones: u32 = buf.iter().map(|b| b.count_ones()).sum();
            Ok(Value::from_bytes(
                &(ones as u128).to_le_bytes()[..size],
            ))
        }
        "cttz_nonzero" => {
            let size = args[0].size();
            let mut buf = vec![0u8; size];
            args[0].read_bytes(0, &mut buf)?;
            let mut count = 0u32;
            'outer: for b in &buf {
                if *b == 0 {
                    count += 8;
                } else {
                    count += b.trailing_zeros();
                    break 'outer;
                }
            }
            Ok(Value::from_bytes(
                &(count as u128).to_le_bytes()[..size],
            ))
        }
        "ptr_guaranteed_eq" | "ptr_guaranteed_ne" => {
            let same = {
                let av = args[0].read_usize(0)?;
                let bv = args[1].read_usize(0)?;
                let ar = args[0].get_relocation(0);
                let br = args[1].get_relocation(0);
                av == bv
                    && match (ar, br) {
                        (Some(a), Some(b)) => a.same_target(&b),
                        (None, None) => true,
                        _ => false,
                    }
            };
            let res = if name == "ptr_guaranteed_eq" {
                same
            } else {
                !same
            };
            Ok(Value::from_bytes(&[res as u8]))
        }
        "caller_location" => {
            // A zeroed Location; callers only pass it through.
            let alloc = AllocHandle::alloc(POINTER_SIZE * 3);
            alloc
                .borrow_mut()
                .write_bytes(0, &[0; POINTER_SIZE * 3])?;
            Ok(Value::new_pointer(0, RelocTarget::Alloc(alloc)))
        }
        other => Err(EvalError::MissingIntrinsic(other.to_string())),
    }
}

fn saturate(v: PrimitiveValue, ovf: Overflow) -> PrimitiveValue {
    // The wrapped result is already closest-representable when no overflow;
    // otherwise clamp by re-deriving from the direction.
    match ovf {
        Overflow::None => v,
        Overflow::Max => match v {
            PrimitiveValue::U8(_) => PrimitiveValue::U8(u8::MAX),
            PrimitiveValue::U16(_) => PrimitiveValue::U16(u16::MAX),
            PrimitiveValue::U32(_) => PrimitiveValue::U32(u32::MAX),
            PrimitiveValue::U64(_) => PrimitiveValue::U64(u64::MAX),
            PrimitiveValue::U128(_) => PrimitiveValue::U128(u128::MAX),
            PrimitiveValue::Usize(_) => PrimitiveValue::Usize(u64::MAX),
            PrimitiveValue::I8(_) => PrimitiveValue::I8(i8::MAX),
            PrimitiveValue::I16(_) => PrimitiveValue::I16(i16::MAX),
            PrimitiveValue::I32(_) => PrimitiveValue::I32(i32::MAX),
            PrimitiveValue::I64(_) => PrimitiveValue::I64(i64::MAX),
            PrimitiveValue::I128(_) => PrimitiveValue::I128(i128::MAX),
            PrimitiveValue::Isize(_) => PrimitiveValue::Isize(i64::MAX),
        },
        Overflow::Min => match v {
            PrimitiveValue::U8(_) => PrimitiveValue::U8(0),
            PrimitiveValue::U16(_) => PrimitiveValue::U16(0),
            PrimitiveValue::U32(_) => PrimitiveValue::U32(0),
            PrimitiveValue::U64(_) => PrimitiveValue::U64(0),
            PrimitiveValue::U128(_) => PrimitiveValue::U128(0),
            PrimitiveValue::Usize(_) => PrimitiveValue::Usize(0),
            PrimitiveValue::I8(_) => PrimitiveValue::I8(i8::MIN),
            PrimitiveValue::I16(_) => PrimitiveValue::I16(i16::MIN),
            PrimitiveValue::I32(_) => PrimitiveValue::I32(i32::MIN),
            PrimitiveValue::I64(_) => PrimitiveValue::I64(i64::MIN),
            PrimitiveValue::I128(_) => PrimitiveValue::I128(i128::MIN),
            PrimitiveValue::Isize(_) => PrimitiveValue::Isize(i64::MIN),
        },
    }
}

/// Size or alignment of an unsized value through its fat-pointer metadata.
fn dyn_size_align(
    ctx: &CallCtx<'_, '_>,
    ty: &TypeRef,
    ptr: &Value,
    want_align: bool,
) -> EResult<Value> {
    if ty.has_slice_meta() {
        let count = ptr.read_usize(POINTER_SIZE)?;
        let esz = match ty.wrapper() {
            Some(TypeWrapper::Slice) => ty
                .get_inner()
                .size(ctx.tree)
                .ok_or_else(|| EvalError::TypeError("unsized slice element".into()))?,
            _ => 1, // str
        };
        if want_align {
            let a = match ty.wrapper() {
                Some(TypeWrapper::Slice) => align_of(ctx, &ty.get_inner()).unwrap_or(1),
                _ => 1,
            };
            Ok(Value::new_usize(a as u64))
        } else {
            Ok(Value::new_usize(count * esz as u64))
        }
    } else {
        // Trait object: size and alignment live in vtable words 1 and 2.
        let vtable = match ptr.get_relocation(POINTER_SIZE) {
            Some(RelocTarget::Alloc(a)) => a,
            _ => return Err(EvalError::MissingRelocation),
        };
        let word = if want_align { 2 } else { 1 };
        let v = vtable.borrow().read_usize(word * POINTER_SIZE)?;
        Ok(Value::new_usize(v))
    }
}

fn align_of(ctx: &CallCtx<'_, '_>, ty: &TypeRef) -> Option<usize> {
    match ty.wrapper() {
        Some(TypeWrapper::Array(_)) => align_of(ctx, &ty.get_inner()),
        Some(TypeWrapper::Slice) => None,
        Some(_) => Some(POINTER_SIZE),
        None => match ty.inner {
            RawType::Composite => {
                let dt = ctx.tree.data_type(ty.composite?);
                if dt.alignment == 0 {
                    None
                } else {
                    Some(dt.alignment)
                }
            }
            other => other.size().map(|s| s.clamp(1, POINTER_SIZE)),
        },
    }
}

fn atomic_op(
    ctx: &mut CallCtx<'_, '_>,
    base: &str,
    params: &[TypeRef],
    args: Vec<Value>,
) -> EResult<Value> {
    let size = param_size(ctx, params)?;
    match base {
        "fence" => Ok(Value::new_unit()),
        "load" => {
            let (a, ofs) = ptr_target(&args[0])?;
            let v = a.borrow().read_value(ofs, size)?;
            Ok(v)
        }
        "store" => {
            let (a, ofs) = ptr_target(&args[0])?;
            a.borrow_mut().write_value(ofs, &args[1])?;
            Ok(Value::new_unit())
        }
        "xchg" => {
            let (a, ofs) = ptr_target(&args[0])?;
            let old = a.borrow().read_value(ofs, size)?;
            a.borrow_mut().write_value(ofs, &args[1])?;
            Ok(old)
        }
        "cxchg" => {
            let (a, ofs) = ptr_target(&args[0])?;
            let old = a.borrow().read_value(ofs, size)?;
            let mut old_bytes = vec![0u8; size];
            old.read_bytes(0, &mut old_bytes)?;
            let mut expect = vec![0u8; size];
            args[1].read_bytes(0, &mut expect)?;
            let swapped = old_bytes == expect;
            if swapped {
                a.borrow_mut().write_value(ofs, &args[2])?;
            }
            // `(T, bool)` result.
            let mut out = Value::new_direct(size + 1);
            out.write_value(0, &old)?;
            out.write_bytes(size, &[swapped as u8])?;
            Ok(out)
        }
        "xadd" | "xsub" => {
            let ty = &params[0];
            let (a, ofs) = ptr_target(&args[0])?;
            let old = a.borrow().read_value(ofs, size)?;
            let old_ref = value_ref(&old);
            let op_ref = value_ref(&args[1]);
            let lp = PrimitiveValue::from_value(ty.inner, &old_ref)?;
            let rp = PrimitiveValue::from_value(ty.inner, &op_ref)?;
            let new = if base == "xadd" {
                lp.add(&rp)?.0
            } else {
                lp.subtract(&rp)?.0
            };
            a.borrow_mut()
                .write_bytes(ofs, &new.to_le_bytes())?;
            Ok(old)
        }
        other => Err(EvalError::MissingIntrinsic(format!("atomic_{}", other))),
    }
}
