//! Primitive integer arithmetic with overflow classification.
//!
//! One enum over every width; each operation reports whether it stayed in
//! range, overflowed the maximum, or underflowed the minimum. Division and
//! modulo by zero are errors at the call site.

use super::value::ValueRef;
use super::{EResult, EvalError, RawType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    None,
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Usize(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    Isize(i64),
}

macro_rules! prim_binop {
    ($self:ident, $other:ident, $checked:ident, $wrapping:ident, $ovf:expr) => {
        match ($self, $other) {
            (PrimitiveValue::U8(a), PrimitiveValue::U8(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::U8(v), Overflow::None),
                None => (PrimitiveValue::U8(a.$wrapping(*b)), $ovf(false)),
            },
            (PrimitiveValue::U16(a), PrimitiveValue::U16(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::U16(v), Overflow::None),
                None => (PrimitiveValue::U16(a.$wrapping(*b)), $ovf(false)),
            },
            (PrimitiveValue::U32(a), PrimitiveValue::U32(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::U32(v), Overflow::None),
                None => (PrimitiveValue::U32(a.$wrapping(*b)), $ovf(false)),
            },
            (PrimitiveValue::U64(a), PrimitiveValue::U64(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::U64(v), Overflow::None),
                None => (PrimitiveValue::U64(a.$wrapping(*b)), $ovf(false)),
            },
            (PrimitiveValue::U128(a), PrimitiveValue::U128(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::U128(v), Overflow::None),
                None => (PrimitiveValue::U128(a.$wrapping(*b)), $ovf(false)),
            },
            (PrimitiveValue::Usize(a), PrimitiveValue::Usize(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::Usize(v), Overflow::None),
                None => (PrimitiveValue::Usize(a.$wrapping(*b)), $ovf(false)),
            },
            (PrimitiveValue::I8(a), PrimitiveValue::I8(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::I8(v), Overflow::None),
                None => {
                    let w = a.$wrapping(*b);
                    (PrimitiveValue::I8(w), $ovf(w >= 0))
                }
            },
            (PrimitiveValue::I16(a), PrimitiveValue::I16(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::I16(v), Overflow::None),
                None => {
                    let w = a.$wrapping(*b);
                    (PrimitiveValue::I16(w), $ovf(w >= 0))
                }
            },
            (PrimitiveValue::I32(a), PrimitiveValue::I32(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::I32(v), Overflow::None),
                None => {
                    let w = a.$wrapping(*b);
                    (PrimitiveValue::I32(w), $ovf(w >= 0))
                }
            },
            (PrimitiveValue::I64(a), PrimitiveValue::I64(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::I64(v), Overflow::None),
                None => {
                    let w = a.$wrapping(*b);
                    (PrimitiveValue::I64(w), $ovf(w >= 0))
                }
            },
            (PrimitiveValue::I128(a), PrimitiveValue::I128(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::I128(v), Overflow::None),
                None => {
                    let w = a.$wrapping(*b);
                    (PrimitiveValue::I128(w), $ovf(w >= 0))
                }
            },
            (PrimitiveValue::Isize(a), PrimitiveValue::Isize(b)) => match a.$checked(*b) {
                Some(v) => (PrimitiveValue::Isize(v), Overflow::None),
                None => {
                    let w = a.$wrapping(*b);
                    (PrimitiveValue::Isize(w), $ovf(w >= 0))
                }
            },
            _ => {
                return Err(EvalError::TypeError(
                    "mismatched primitive operand widths".into(),
                ))
            }
        }
    };
}

impl PrimitiveValue {
    /// Read a primitive of type `ty` from the start of `v`.
    pub fn from_value(ty: RawType, v: &ValueRef) -> EResult<PrimitiveValue> {
        let mut buf = [0u8; 16];
        let size = ty
            .size()
            .ok_or_else(|| EvalError::TypeError(format!("non-primitive read as primitive")))?;
        v.read_bytes(0, &mut buf[..size])?;
        Ok(match ty {
            RawType::U8 => PrimitiveValue::U8(buf[0]),
            RawType::U16 => PrimitiveValue::U16(u16::from_le_bytes(buf[..2].try_into().unwrap())),
            RawType::U32 => PrimitiveValue::U32(u32::from_le_bytes(buf[..4].try_into().unwrap())),
            RawType::U64 => PrimitiveValue::U64(u64::from_le_bytes(buf[..8].try_into().unwrap())),
            RawType::U128 => PrimitiveValue::U128(u128::from_le_bytes(buf)),
            RawType::USize => {
                PrimitiveValue::Usize(u64::from_le_bytes(buf[..8].try_into().unwrap()))
            }
            RawType::I8 => PrimitiveValue::I8(buf[0] as i8),
            RawType::I16 => PrimitiveValue::I16(i16::from_le_bytes(buf[..2].try_into().unwrap())),
            RawType::I32 => PrimitiveValue::I32(i32::from_le_bytes(buf[..4].try_into().unwrap())),
            RawType::I64 => PrimitiveValue::I64(i64::from_le_bytes(buf[..8].try_into().unwrap())),
            RawType::I128 => PrimitiveValue::I128(i128::from_le_bytes(buf)),
            RawType::ISize => {
                PrimitiveValue::Isize(i64::from_le_bytes(buf[..8].try_into().unwrap()))
            }
            RawType::Bool => PrimitiveValue::U8(buf[0]),
            RawType::Char => PrimitiveValue::U32(u32::from_le_bytes(buf[..4].try_into().unwrap())),
            other => {
                return Err(EvalError::TypeError(format!(
                    "{:?} is not an integer primitive",
                    other
                )))
            }
        })
    }

    pub fn is_zero(&self) -> bool {
        self.as_u128() == 0
    }

    pub fn is_negative(&self) -> bool {
        match *self {
            PrimitiveValue::I8(v) => v < 0,
            PrimitiveValue::I16(v) => v < 0,
            PrimitiveValue::I32(v) => v < 0,
            PrimitiveValue::I64(v) | PrimitiveValue::Isize(v) => v < 0,
            PrimitiveValue::I128(v) => v < 0,
            _ => false,
        }
    }

    /// Raw bits, zero-extended.
    pub fn as_u128(&self) -> u128 {
        match *self {
            PrimitiveValue::U8(v) => v as u128,
            PrimitiveValue::U16(v) => v as u128,
            PrimitiveValue::U32(v) => v as u128,
            PrimitiveValue::U64(v) | PrimitiveValue::Usize(v) => v as u128,
            PrimitiveValue::U128(v) => v,
            PrimitiveValue::I8(v) => v as u8 as u128,
            PrimitiveValue::I16(v) => v as u16 as u128,
            PrimitiveValue::I32(v) => v as u32 as u128,
            PrimitiveValue::I64(v) | PrimitiveValue::Isize(v) => v as u64 as u128,
            PrimitiveValue::I128(v) => v as u128,
        }
    }

    /// Sign-extended value.
    pub fn as_i128(&self) -> i128 {
        match *self {
            PrimitiveValue::I8(v) => v as i128,
            PrimitiveValue::I16(v) => v as i128,
            PrimitiveValue::I32(v) => v as i128,
            PrimitiveValue::I64(v) | PrimitiveValue::Isize(v) => v as i128,
            PrimitiveValue::I128(v) => v,
            other => other.as_u128() as i128,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            PrimitiveValue::U8(_) | PrimitiveValue::I8(_) => 1,
            PrimitiveValue::U16(_) | PrimitiveValue::I16(_) => 2,
            PrimitiveValue::U32(_) | PrimitiveValue::I32(_) => 4,
            PrimitiveValue::U64(_)
            | PrimitiveValue::I64(_)
            | PrimitiveValue::Usize(_)
            | PrimitiveValue::Isize(_) => 8,
            PrimitiveValue::U128(_) | PrimitiveValue::I128(_) => 16,
        }
    }

    pub fn add(&self, other: &PrimitiveValue) -> EResult<(PrimitiveValue, Overflow)> {
        let classify = |wrapped_nonneg: bool| {
            // A wrapped signed result that came out non-negative fell below
            // the minimum; unsigned overflow is always past the maximum.
            if wrapped_nonneg {
                Overflow::Min
            } else {
                Overflow::Max
            }
        };
        Ok(prim_binop!(self, other, checked_add, wrapping_add, classify))
    }

    pub fn subtract(&self, other: &PrimitiveValue) -> EResult<(PrimitiveValue, Overflow)> {
        let classify = |wrapped_nonneg: bool| {
            if wrapped_nonneg {
                Overflow::Min
            } else {
                Overflow::Max
            }
        };
        let (v, ovf) = prim_binop!(self, other, checked_sub, wrapping_sub, classify);
        // Unsigned subtraction that wraps went below zero.
        let ovf = match (ovf, self.is_unsigned()) {
            (Overflow::Max, true) => Overflow::Min,
            (o, _) => o,
        };
        Ok((v, ovf))
    }

    pub fn multiply(&self, other: &PrimitiveValue) -> EResult<(PrimitiveValue, Overflow)> {
        let classify = |wrapped_nonneg: bool| {
            if wrapped_nonneg {
                Overflow::Min
            } else {
                Overflow::Max
            }
        };
        Ok(prim_binop!(self, other, checked_mul, wrapping_mul, classify))
    }

    pub fn divide(&self, other: &PrimitiveValue) -> EResult<PrimitiveValue> {
        if other.is_zero() {
            return Err(EvalError::DivideByZero);
        }
        let classify = |_| Overflow::Max;
        let (v, _) = prim_binop!(self, other, checked_div, wrapping_div, classify);
        Ok(v)
    }

    pub fn modulo(&self, other: &PrimitiveValue) -> EResult<PrimitiveValue> {
        if other.is_zero() {
            return Err(EvalError::DivideByZero);
        }
        let classify = |_| Overflow::Max;
        let (v, _) = prim_binop!(self, other, checked_rem, wrapping_rem, classify);
        Ok(v)
    }

    fn is_unsigned(&self) -> bool {
        matches!(
            self,
            PrimitiveValue::U8(_)
                | PrimitiveValue::U16(_)
                | PrimitiveValue::U32(_)
                | PrimitiveValue::U64(_)
                | PrimitiveValue::U128(_)
                | PrimitiveValue::Usize(_)
        )
    }

    /// Write the value's bytes into `tgt` at `ofs`.
    pub fn write_to(&self, tgt: &ValueRef, ofs: usize) -> EResult<()> {
        let bytes = self.as_u128().to_le_bytes();
        tgt.write_bytes(ofs, &bytes[..self.size()])
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.as_u128().to_le_bytes()[..self.size()].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_add_overflow_is_max() {
        let a = PrimitiveValue::U8(250);
        let b = PrimitiveValue::U8(10);
        let (v, ovf) = a.add(&b).unwrap();
        assert_eq!(v, PrimitiveValue::U8(4));
        assert_eq!(ovf, Overflow::Max);
    }

    #[test]
    fn unsigned_sub_underflow_is_min() {
        let a = PrimitiveValue::U16(1);
        let b = PrimitiveValue::U16(2);
        let (v, ovf) = a.subtract(&b).unwrap();
        assert_eq!(v, PrimitiveValue::U16(u16::MAX));
        assert_eq!(ovf, Overflow::Min);
    }

    #[test]
    fn signed_add_stays_in_range() {
        let a = PrimitiveValue::I32(5);
        let b = PrimitiveValue::I32(-3);
        let (v, ovf) = a.add(&b).unwrap();
        assert_eq!(v, PrimitiveValue::I32(2));
        assert_eq!(ovf, Overflow::None);
    }

    #[test]
    fn signed_overflow_classifies_direction() {
        // 127 + 1 overflows the maximum (wraps negative).
        let (_, ovf) = PrimitiveValue::I8(127)
            .add(&PrimitiveValue::I8(1))
            .unwrap();
        assert_eq!(ovf, Overflow::Max);
        // -128 - 1 underflows the minimum (wraps non-negative).
        let (_, ovf) = PrimitiveValue::I8(-128)
            .subtract(&PrimitiveValue::I8(1))
            .unwrap();
        assert_eq!(ovf, Overflow::Min);
    }

    #[test]
    fn divide_by_zero_is_an_error() {
        let err = PrimitiveValue::U32(1)
            .divide(&PrimitiveValue::U32(0))
            .unwrap_err();
        assert!(matches!(err, EvalError::DivideByZero));
    }

    #[test]
    fn mismatched_widths_fail() {
        assert!(PrimitiveValue::U8(1).add(&PrimitiveValue::U16(1)).is_err());
    }
}
