//! Byte- and relocation-accurate memory model.
//!
//! An `Allocation` is a byte buffer with a parallel validity bitmap and a
//! relocation list. Relocations are the only way a pointer survives being
//! read or written: they mark which byte spans are pointer-valued and which
//! target they point at. `Value` is either a small inline buffer (no
//! relocations possible) or a whole backing allocation.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use super::{EResult, EvalError, Path, POINTER_SIZE};

/// Inline buffer capacity of a direct `Value`.
const DIRECT_CAP: usize = 24;

/// What a relocation points at.
#[derive(Clone)]
pub enum RelocTarget {
    Alloc(AllocHandle),
    Function(Rc<Path>),
    /// A distinguished host-side handle (console handles and the like);
    /// reads recognise it without dereferencing.
    Ffi(FfiMarker),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfiMarker {
    pub name: &'static str,
    pub key: u64,
}

impl RelocTarget {
    pub fn as_alloc(&self) -> Option<&AllocHandle> {
        match self {
            RelocTarget::Alloc(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Path> {
        match self {
            RelocTarget::Function(p) => Some(p),
            _ => None,
        }
    }

    pub fn same_target(&self, other: &RelocTarget) -> bool {
        match (self, other) {
            (RelocTarget::Alloc(a), RelocTarget::Alloc(b)) => a.ptr_eq(b),
            (RelocTarget::Function(a), RelocTarget::Function(b)) => a == b,
            (RelocTarget::Ffi(a), RelocTarget::Ffi(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for RelocTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelocTarget::Alloc(a) => write!(f, "alloc({} bytes)", a.size()),
            RelocTarget::Function(p) => write!(f, "fn {}", p),
            RelocTarget::Ffi(m) => write!(f, "ffi {}#{}", m.name, m.key),
        }
    }
}

/// A pointer-valued byte span inside an allocation. The span is always
/// `POINTER_SIZE` bytes starting at `offset`.
#[derive(Debug, Clone)]
pub struct Relocation {
    pub offset: usize,
    pub target: RelocTarget,
}

impl Relocation {
    fn overlaps(&self, ofs: usize, size: usize) -> bool {
        self.offset < ofs + size && ofs < self.offset + POINTER_SIZE
    }

    fn contained_in(&self, ofs: usize, size: usize) -> bool {
        ofs <= self.offset && self.offset + POINTER_SIZE <= ofs + size
    }
}

#[derive(Default, Clone)]
pub struct Allocation {
    data: Vec<u8>,
    /// One bit per byte; unset bits are undefined to read.
    mask: Vec<u8>,
    relocations: Vec<Relocation>,
}

impl Allocation {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }

    fn mask_bit(&self, i: usize) -> bool {
        self.mask[i / 8] & (1 << (i % 8)) != 0
    }

    fn set_mask_bit(&mut self, i: usize, v: bool) {
        if v {
            self.mask[i / 8] |= 1 << (i % 8);
        } else {
            self.mask[i / 8] &= !(1 << (i % 8));
        }
    }

    fn check_range(&self, ofs: usize, size: usize) -> EResult<()> {
        if ofs + size > self.data.len() {
            Err(EvalError::OutOfBounds {
                ofs,
                size,
                limit: self.data.len(),
            })
        } else {
            Ok(())
        }
    }

    pub fn check_bytes_valid(&self, ofs: usize, size: usize) -> EResult<()> {
        self.check_range(ofs, size)?;
        for i in ofs..ofs + size {
            if !self.mask_bit(i) {
                return Err(EvalError::UndefinedRead { ofs, size });
            }
        }
        Ok(())
    }

    pub fn mark_bytes_valid(&mut self, ofs: usize, size: usize) {
        for i in ofs..ofs + size {
            self.set_mask_bit(i, true);
        }
    }

    pub fn mark_bytes_invalid(&mut self, ofs: usize, size: usize) {
        for i in ofs..ofs + size {
            self.set_mask_bit(i, false);
        }
    }

    pub fn get_relocation(&self, ofs: usize) -> Option<RelocTarget> {
        self.relocations
            .iter()
            .find(|r| r.offset == ofs)
            .map(|r| r.target.clone())
    }

    /// Remove relocations whose span overlaps the written range.
    fn clear_relocations_in(&mut self, ofs: usize, size: usize) {
        self.relocations.retain(|r| !r.overlaps(ofs, size));
    }

    pub fn set_relocation(&mut self, ofs: usize, target: RelocTarget) {
        self.clear_relocations_in(ofs, POINTER_SIZE.min(self.data.len() - ofs));
        self.relocations.push(Relocation {
            offset: ofs,
            target,
        });
    }

    pub fn read_bytes(&self, ofs: usize, dst: &mut [u8]) -> EResult<()> {
        self.check_bytes_valid(ofs, dst.len())?;
        dst.copy_from_slice(&self.data[ofs..ofs + dst.len()]);
        Ok(())
    }

    /// Raw write: wipes overlapping relocations, marks written bytes valid.
    pub fn write_bytes(&mut self, ofs: usize, src: &[u8]) -> EResult<()> {
        self.check_range(ofs, src.len())?;
        self.clear_relocations_in(ofs, src.len());
        self.data[ofs..ofs + src.len()].copy_from_slice(src);
        self.mark_bytes_valid(ofs, src.len());
        Ok(())
    }

    pub fn read_usize(&self, ofs: usize) -> EResult<u64> {
        let mut buf = [0u8; POINTER_SIZE];
        self.read_bytes(ofs, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn write_usize(&mut self, ofs: usize, v: u64) -> EResult<()> {
        self.write_bytes(ofs, &v.to_le_bytes())
    }

    /// Write a pointer: integer value plus relocation.
    pub fn write_ptr(&mut self, ofs: usize, value: u64, target: RelocTarget) -> EResult<()> {
        self.write_usize(ofs, value)?;
        self.set_relocation(ofs, target);
        Ok(())
    }

    /// Read a range as a `Value`, carrying any relocations it covers. A
    /// range that cuts a relocation in half is a partial pointer read.
    pub fn read_value(&self, ofs: usize, size: usize) -> EResult<Value> {
        self.check_range(ofs, size)?;
        let mut carried = Vec::new();
        for r in &self.relocations {
            if r.overlaps(ofs, size) {
                if r.contained_in(ofs, size) {
                    carried.push(Relocation {
                        offset: r.offset - ofs,
                        target: r.target.clone(),
                    });
                } else {
                    return Err(EvalError::PartialPointerRead { ofs: r.offset });
                }
            }
        }
        if carried.is_empty() && size <= DIRECT_CAP {
            let mut v = Value::new_direct(size);
            if let ValueData::Direct { bytes, mask, len } = &mut v.data {
                bytes[..size].copy_from_slice(&self.data[ofs..ofs + size]);
                for i in 0..size {
                    if self.mask_bit(ofs + i) {
                        *mask |= 1 << i;
                    }
                }
                debug_assert_eq!(*len as usize, size);
            }
            Ok(v)
        } else {
            let out = AllocHandle::alloc(size);
            {
                let mut a = out.borrow_mut();
                a.data.copy_from_slice(&self.data[ofs..ofs + size]);
                for i in 0..size {
                    a.set_mask_bit(i, self.mask_bit(ofs + i));
                }
                a.relocations = carried;
            }
            Ok(Value::from_alloc(out))
        }
    }

    /// Write a `Value`: bytes, validity, and relocations all transfer.
    pub fn write_value(&mut self, ofs: usize, v: &Value) -> EResult<()> {
        let size = v.size();
        self.check_range(ofs, size)?;
        self.clear_relocations_in(ofs, size);
        match &v.data {
            ValueData::Direct { bytes, mask, len } => {
                let len = *len as usize;
                self.data[ofs..ofs + len].copy_from_slice(&bytes[..len]);
                for i in 0..len {
                    self.set_mask_bit(ofs + i, mask & (1 << i) != 0);
                }
            }
            ValueData::Alloc(src) => {
                let src = src.borrow();
                self.data[ofs..ofs + size].copy_from_slice(&src.data);
                for i in 0..size {
                    self.set_mask_bit(ofs + i, src.mask_bit(i));
                }
                for r in &src.relocations {
                    self.relocations.push(Relocation {
                        offset: r.offset + ofs,
                        target: r.target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Grow or shrink in place; the bitmap and relocation list are clipped
    /// or extended to match. New bytes are undefined.
    pub fn resize(&mut self, new_size: usize) {
        let old_size = self.data.len();
        self.data.resize(new_size, 0);
        self.mask.resize((new_size + 7) / 8, 0);
        if new_size < old_size {
            self.relocations
                .retain(|r| r.offset + POINTER_SIZE <= new_size);
            for i in new_size..new_size.min(self.mask.len() * 8) {
                self.set_mask_bit(i, false);
            }
        }
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Allocation({} bytes", self.data.len())?;
        if !self.relocations.is_empty() {
            write!(f, ", {} relocs", self.relocations.len())?;
        }
        write!(f, ")")
    }
}

/// Reference-counted handle to an allocation. Cycles (an allocation whose
/// bytes point back at itself) leak; the interpreter exits at program end.
#[derive(Clone)]
pub struct AllocHandle(Rc<RefCell<Allocation>>);

impl AllocHandle {
    pub fn alloc(size: usize) -> AllocHandle {
        AllocHandle(Rc::new(RefCell::new(Allocation {
            data: vec![0; size],
            mask: vec![0; (size + 7) / 8],
            relocations: Vec::new(),
        })))
    }

    pub fn borrow(&self) -> Ref<'_, Allocation> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Allocation> {
        self.0.borrow_mut()
    }

    pub fn size(&self) -> usize {
        self.0.borrow().size()
    }

    pub fn ptr_eq(&self, other: &AllocHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for AllocHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0.borrow())
    }
}

#[derive(Debug, Clone)]
enum ValueData {
    /// Small pointerless scalars live inline.
    Direct {
        bytes: [u8; DIRECT_CAP],
        /// One validity bit per byte.
        mask: u32,
        len: u8,
    },
    Alloc(AllocHandle),
}

/// Either an inline byte buffer or a whole backing allocation.
#[derive(Debug, Clone)]
pub struct Value {
    data: ValueData,
}

impl Value {
    /// An undefined value of the given size.
    pub fn new_direct(size: usize) -> Value {
        if size <= DIRECT_CAP {
            Value {
                data: ValueData::Direct {
                    bytes: [0; DIRECT_CAP],
                    mask: 0,
                    len: size as u8,
                },
            }
        } else {
            Value::from_alloc(AllocHandle::alloc(size))
        }
    }

    pub fn from_alloc(handle: AllocHandle) -> Value {
        Value {
            data: ValueData::Alloc(handle),
        }
    }

    pub fn from_bytes(src: &[u8]) -> Value {
        let mut v = Value::new_direct(src.len());
        v.write_bytes(0, src).expect("fresh value fits its bytes");
        v
    }

    pub fn new_u64(v: u64, size: usize) -> Value {
        let bytes = v.to_le_bytes();
        Value::from_bytes(&bytes[..size.min(8)])
    }

    pub fn new_i32(v: i32) -> Value {
        Value::from_bytes(&v.to_le_bytes())
    }

    pub fn new_usize(v: u64) -> Value {
        Value::from_bytes(&v.to_le_bytes())
    }

    pub fn new_unit() -> Value {
        Value::new_direct(0)
    }

    /// A pointer value: integer part plus relocation.
    pub fn new_pointer(value: u64, target: RelocTarget) -> Value {
        let handle = AllocHandle::alloc(POINTER_SIZE);
        handle
            .borrow_mut()
            .write_ptr(0, value, target)
            .expect("pointer fits");
        Value::from_alloc(handle)
    }

    pub fn new_fnptr(path: Path) -> Value {
        Value::new_pointer(0, RelocTarget::Function(Rc::new(path)))
    }

    pub fn size(&self) -> usize {
        match &self.data {
            ValueData::Direct { len, .. } => *len as usize,
            ValueData::Alloc(a) => a.size(),
        }
    }

    pub fn backing_alloc(&self) -> Option<AllocHandle> {
        match &self.data {
            ValueData::Direct { .. } => None,
            ValueData::Alloc(a) => Some(a.clone()),
        }
    }

    /// Promote to allocation backing (no-op if already backed) and return
    /// the handle. Bytes, validity, and size are preserved.
    pub fn create_allocation(&mut self) -> AllocHandle {
        if let ValueData::Direct { bytes, mask, len } = &self.data {
            let len = *len as usize;
            let handle = AllocHandle::alloc(len);
            {
                let mut a = handle.borrow_mut();
                a.data.copy_from_slice(&bytes[..len]);
                for i in 0..len {
                    a.set_mask_bit(i, mask & (1 << i) != 0);
                }
            }
            self.data = ValueData::Alloc(handle);
        }
        match &self.data {
            ValueData::Alloc(a) => a.clone(),
            ValueData::Direct { .. } => unreachable!(),
        }
    }

    pub fn check_bytes_valid(&self, ofs: usize, size: usize) -> EResult<()> {
        match &self.data {
            ValueData::Direct { mask, len, .. } => {
                if ofs + size > *len as usize {
                    return Err(EvalError::OutOfBounds {
                        ofs,
                        size,
                        limit: *len as usize,
                    });
                }
                for i in ofs..ofs + size {
                    if mask & (1 << i) == 0 {
                        return Err(EvalError::UndefinedRead { ofs, size });
                    }
                }
                Ok(())
            }
            ValueData::Alloc(a) => a.borrow().check_bytes_valid(ofs, size),
        }
    }

    pub fn mark_bytes_valid(&mut self, ofs: usize, size: usize) {
        match &mut self.data {
            ValueData::Direct { mask, .. } => {
                for i in ofs..ofs + size {
                    *mask |= 1 << i;
                }
            }
            ValueData::Alloc(a) => a.borrow_mut().mark_bytes_valid(ofs, size),
        }
    }

    pub fn read_bytes(&self, ofs: usize, dst: &mut [u8]) -> EResult<()> {
        match &self.data {
            ValueData::Direct { bytes, .. } => {
                self.check_bytes_valid(ofs, dst.len())?;
                dst.copy_from_slice(&bytes[ofs..ofs + dst.len()]);
                Ok(())
            }
            ValueData::Alloc(a) => a.borrow().read_bytes(ofs, dst),
        }
    }

    pub fn write_bytes(&mut self, ofs: usize, src: &[u8]) -> EResult<()> {
        match &mut self.data {
            ValueData::Direct { bytes, mask, len } => {
                if ofs + src.len() > *len as usize {
                    return Err(EvalError::OutOfBounds {
                        ofs,
                        size: src.len(),
                        limit: *len as usize,
                    });
                }
                bytes[ofs..ofs + src.len()].copy_from_slice(src);
                for i in ofs..ofs + src.len() {
                    *mask |= 1 << i;
                }
                Ok(())
            }
            ValueData::Alloc(a) => a.borrow_mut().write_bytes(ofs, src),
        }
    }

    pub fn read_value(&self, ofs: usize, size: usize) -> EResult<Value> {
        match &self.data {
            ValueData::Direct { bytes, mask, len } => {
                if ofs + size > *len as usize {
                    return Err(EvalError::OutOfBounds {
                        ofs,
                        size,
                        limit: *len as usize,
                    });
                }
                // Validity travels with the copy; typed reads check it.
                let mut out = Value::new_direct(size);
                if let ValueData::Direct {
                    bytes: ob,
                    mask: om,
                    ..
                } = &mut out.data
                {
                    ob[..size].copy_from_slice(&bytes[ofs..ofs + size]);
                    for i in 0..size {
                        if mask & (1 << (ofs + i)) != 0 {
                            *om |= 1 << i;
                        }
                    }
                }
                Ok(out)
            }
            ValueData::Alloc(a) => a.borrow().read_value(ofs, size),
        }
    }

    /// Write a value; if the source carries relocations into a direct
    /// destination, the destination is promoted to allocation backing.
    pub fn write_value(&mut self, ofs: usize, v: &Value) -> EResult<()> {
        let src_has_relocs = match &v.data {
            ValueData::Direct { .. } => false,
            ValueData::Alloc(a) => !a.borrow().relocations.is_empty(),
        };
        if src_has_relocs {
            self.create_allocation();
        }
        match &mut self.data {
            ValueData::Direct { bytes, mask, len } => {
                let size = v.size();
                if ofs + size > *len as usize {
                    return Err(EvalError::OutOfBounds {
                        ofs,
                        size,
                        limit: *len as usize,
                    });
                }
                match &v.data {
                    ValueData::Direct {
                        bytes: sb,
                        mask: sm,
                        len: sl,
                    } => {
                        let sl = *sl as usize;
                        bytes[ofs..ofs + sl].copy_from_slice(&sb[..sl]);
                        for i in 0..sl {
                            if sm & (1 << i) != 0 {
                                *mask |= 1 << (ofs + i);
                            } else {
                                *mask &= !(1 << (ofs + i));
                            }
                        }
                    }
                    ValueData::Alloc(sa) => {
                        let sa = sa.borrow();
                        bytes[ofs..ofs + size].copy_from_slice(&sa.data);
                        for i in 0..size {
                            if sa.mask_bit(i) {
                                *mask |= 1 << (ofs + i);
                            } else {
                                *mask &= !(1 << (ofs + i));
                            }
                        }
                    }
                }
                Ok(())
            }
            ValueData::Alloc(a) => a.borrow_mut().write_value(ofs, v),
        }
    }

    pub fn read_usize(&self, ofs: usize) -> EResult<u64> {
        let mut buf = [0u8; POINTER_SIZE];
        self.read_bytes(ofs, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn write_usize(&mut self, ofs: usize, v: u64) -> EResult<()> {
        self.write_bytes(ofs, &v.to_le_bytes())
    }

    pub fn read_u8(&self, ofs: usize) -> EResult<u8> {
        let mut b = [0u8; 1];
        self.read_bytes(ofs, &mut b)?;
        Ok(b[0])
    }

    /// Relocation starting at `ofs`, if the value is allocation-backed.
    pub fn get_relocation(&self, ofs: usize) -> Option<RelocTarget> {
        match &self.data {
            ValueData::Direct { .. } => None,
            ValueData::Alloc(a) => a.borrow().get_relocation(ofs),
        }
    }

    pub fn set_relocation(&mut self, ofs: usize, target: RelocTarget) {
        let handle = self.create_allocation();
        let mut a = handle.borrow_mut();
        a.set_relocation(ofs, target);
    }
}

/// A window into an allocation: the result of resolving an lvalue. Taking a
/// reference to a direct local promotes it to allocation backing first, so
/// every `ValueRef` is handle + offset + size (+ fat-pointer metadata).
#[derive(Clone)]
pub struct ValueRef {
    pub alloc: AllocHandle,
    pub offset: usize,
    pub size: usize,
    pub metadata: Option<Box<Value>>,
}

impl ValueRef {
    pub fn new(alloc: AllocHandle, offset: usize, size: usize) -> ValueRef {
        ValueRef {
            alloc,
            offset,
            size,
            metadata: None,
        }
    }

    pub fn read_value(&self, ofs: usize, size: usize) -> EResult<Value> {
        self.check_window(ofs, size)?;
        self.alloc.borrow().read_value(self.offset + ofs, size)
    }

    pub fn read_whole(&self) -> EResult<Value> {
        self.read_value(0, self.size)
    }

    pub fn write_value(&self, ofs: usize, v: &Value) -> EResult<()> {
        self.check_window(ofs, v.size())?;
        self.alloc.borrow_mut().write_value(self.offset + ofs, v)
    }

    pub fn read_bytes(&self, ofs: usize, dst: &mut [u8]) -> EResult<()> {
        self.check_window(ofs, dst.len())?;
        self.alloc.borrow().read_bytes(self.offset + ofs, dst)
    }

    pub fn write_bytes(&self, ofs: usize, src: &[u8]) -> EResult<()> {
        self.check_window(ofs, src.len())?;
        self.alloc.borrow_mut().write_bytes(self.offset + ofs, src)
    }

    pub fn read_usize(&self, ofs: usize) -> EResult<u64> {
        let mut buf = [0u8; POINTER_SIZE];
        self.read_bytes(ofs, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn write_usize(&self, ofs: usize, v: u64) -> EResult<()> {
        self.write_bytes(ofs, &v.to_le_bytes())
    }

    pub fn get_relocation(&self, ofs: usize) -> Option<RelocTarget> {
        self.alloc.borrow().get_relocation(self.offset + ofs)
    }

    pub fn mark_bytes_invalid(&self) {
        self.alloc
            .borrow_mut()
            .mark_bytes_invalid(self.offset, self.size);
    }

    fn check_window(&self, ofs: usize, size: usize) -> EResult<()> {
        if ofs + size > self.size {
            Err(EvalError::OutOfBounds {
                ofs,
                size,
                limit: self.size,
            })
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueRef(+{}, {} bytes)", self.offset, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_allocation_is_undefined() {
        let a = AllocHandle::alloc(8);
        assert!(a.borrow().check_bytes_valid(0, 8).is_err());
    }

    #[test]
    fn write_marks_valid() {
        let a = AllocHandle::alloc(8);
        a.borrow_mut().write_bytes(0, &[1, 2, 3, 4]).unwrap();
        assert!(a.borrow().check_bytes_valid(0, 4).is_ok());
        assert!(a.borrow().check_bytes_valid(0, 5).is_err());
    }

    #[test]
    fn out_of_bounds_write_fails() {
        let a = AllocHandle::alloc(4);
        assert!(a.borrow_mut().write_bytes(2, &[0; 4]).is_err());
    }

    #[test]
    fn pointer_survives_whole_read() {
        let a = AllocHandle::alloc(16);
        let target = AllocHandle::alloc(4);
        a.borrow_mut()
            .write_ptr(0, 0, RelocTarget::Alloc(target.clone()))
            .unwrap();
        let v = a.borrow().read_value(0, 8).unwrap();
        let reloc = v.get_relocation(0).expect("relocation carried");
        assert!(reloc.as_alloc().unwrap().ptr_eq(&target));
    }

    #[test]
    fn partial_pointer_read_is_undefined() {
        let a = AllocHandle::alloc(16);
        let target = AllocHandle::alloc(4);
        a.borrow_mut()
            .write_ptr(0, 0, RelocTarget::Alloc(target))
            .unwrap();
        let err = a.borrow().read_value(0, 4).unwrap_err();
        assert!(matches!(err, EvalError::PartialPointerRead { .. }));
    }

    #[test]
    fn overlapping_write_clears_relocation() {
        let a = AllocHandle::alloc(16);
        let target = AllocHandle::alloc(4);
        a.borrow_mut()
            .write_ptr(4, 0, RelocTarget::Alloc(target))
            .unwrap();
        // Write over part of the pointer span.
        a.borrow_mut().write_bytes(0, &[0u8; 8]).unwrap();
        assert!(a.borrow().get_relocation(4).is_none());
    }

    #[test]
    fn write_value_reinstates_relocations() {
        let src = AllocHandle::alloc(8);
        let target = AllocHandle::alloc(4);
        src.borrow_mut()
            .write_ptr(0, 0, RelocTarget::Alloc(target.clone()))
            .unwrap();
        let v = src.borrow().read_value(0, 8).unwrap();

        let dst = AllocHandle::alloc(24);
        dst.borrow_mut().write_value(16, &v).unwrap();
        let reloc = dst.borrow().get_relocation(16).expect("moved relocation");
        assert!(reloc.as_alloc().unwrap().ptr_eq(&target));
    }

    #[test]
    fn direct_value_promotes_on_relocated_write() {
        let src = Value::new_pointer(0, RelocTarget::Alloc(AllocHandle::alloc(1)));
        let mut dst = Value::new_direct(8);
        dst.write_value(0, &src).unwrap();
        assert!(dst.backing_alloc().is_some());
        assert!(dst.get_relocation(0).is_some());
    }

    #[test]
    fn value_round_trips_integers() {
        let v = Value::new_u64(0x1234_5678, 4);
        let mut buf = [0u8; 4];
        v.read_bytes(0, &mut buf).unwrap();
        assert_eq!(u32::from_le_bytes(buf), 0x1234_5678);
    }

    #[test]
    fn value_ref_window_is_bounds_checked() {
        let a = AllocHandle::alloc(16);
        a.borrow_mut().write_bytes(0, &[0; 16]).unwrap();
        let r = ValueRef::new(a, 8, 4);
        assert!(r.read_value(0, 4).is_ok());
        assert!(r.read_value(2, 4).is_err());
    }

    #[test]
    fn self_referential_allocation_is_allowed() {
        let a = AllocHandle::alloc(8);
        a.borrow_mut()
            .write_ptr(0, 0, RelocTarget::Alloc(a.clone()))
            .unwrap();
        let got = a.borrow().get_relocation(0).unwrap();
        assert!(got.as_alloc().unwrap().ptr_eq(&a));
    }
}
