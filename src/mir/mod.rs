//! The post-lowering IR (MIR) and its interpreter.
//!
//! `lex`/`module` load the textual IR into a module tree, `value` is the
//! byte- and relocation-accurate memory model, `interp` executes basic
//! blocks over a per-thread call stack, with `intrinsics` and `ffi`
//! supplying the built-in operations the IR assumes.

pub mod ffi;
pub mod interp;
pub mod intrinsics;
pub mod lex;
pub mod module;
pub mod primitive;
pub mod value;

use std::fmt;

pub const POINTER_SIZE: usize = 8;

pub type EResult<T> = Result<T, EvalError>;

/// Interpretation errors are fatal: the interpreter prints the frame stack
/// and exits with status 1.
#[derive(Debug, Clone)]
pub enum EvalError {
    OutOfBounds {
        ofs: usize,
        size: usize,
        limit: usize,
    },
    UndefinedRead {
        ofs: usize,
        size: usize,
    },
    PartialPointerRead {
        ofs: usize,
    },
    MissingRelocation,
    SizeMismatch {
        expected: usize,
        got: usize,
    },
    TypeError(String),
    MissingFunction(String),
    MissingStatic(String),
    MissingIntrinsic(String),
    MissingExtern(String),
    DivideByZero,
    Unreachable(String),
    /// A panic unwound past the root frame.
    Panicked,
    Todo(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::OutOfBounds { ofs, size, limit } => write!(
                f,
                "access of {} bytes at offset {} outside allocation of {} bytes",
                size, ofs, limit
            ),
            EvalError::UndefinedRead { ofs, size } => write!(
                f,
                "read of {} undefined bytes at offset {}",
                size, ofs
            ),
            EvalError::PartialPointerRead { ofs } => {
                write!(f, "partial read of a pointer at offset {}", ofs)
            }
            EvalError::MissingRelocation => {
                write!(f, "dereference of a value with no relocation")
            }
            EvalError::SizeMismatch { expected, got } => {
                write!(f, "value size mismatch: expected {}, got {}", expected, got)
            }
            EvalError::TypeError(msg) => write!(f, "type error: {}", msg),
            EvalError::MissingFunction(name) => write!(f, "no function named {}", name),
            EvalError::MissingStatic(name) => write!(f, "no static named {}", name),
            EvalError::MissingIntrinsic(name) => {
                write!(f, "TODO: unimplemented intrinsic `{}`", name)
            }
            EvalError::MissingExtern(name) => {
                write!(f, "TODO: unimplemented extern `{}`", name)
            }
            EvalError::DivideByZero => write!(f, "division by zero"),
            EvalError::Unreachable(msg) => write!(f, "entered unreachable code: {}", msg),
            EvalError::Panicked => write!(f, "thread panicked with no handler"),
            EvalError::Todo(msg) => write!(f, "TODO: {}", msg),
        }
    }
}

impl std::error::Error for EvalError {}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawType {
    Unreachable,
    Function,
    Unit,
    Bool,
    U8,
    U16,
    U32,
    U64,
    U128,
    USize,
    I8,
    I16,
    I32,
    I64,
    I128,
    ISize,
    F32,
    F64,
    Char,
    Str,
    /// Struct, enum, union, or tuple; layout in the module tree.
    Composite,
    /// Data pointer is `*const ()`; metadata is the vtable.
    TraitObject,
}

impl RawType {
    /// Size in bytes; `None` for unsized or layout-carried types.
    pub fn size(self) -> Option<usize> {
        Some(match self {
            RawType::Unreachable => 0,
            RawType::Function => POINTER_SIZE,
            RawType::Unit => 0,
            RawType::Bool | RawType::U8 | RawType::I8 => 1,
            RawType::U16 | RawType::I16 => 2,
            RawType::U32 | RawType::I32 | RawType::Char | RawType::F32 => 4,
            RawType::U64 | RawType::I64 | RawType::F64 => 8,
            RawType::U128 | RawType::I128 => 16,
            RawType::USize | RawType::ISize => POINTER_SIZE,
            RawType::Str | RawType::Composite | RawType::TraitObject => return None,
        })
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            RawType::I8 | RawType::I16 | RawType::I32 | RawType::I64 | RawType::I128 | RawType::ISize
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, RawType::F32 | RawType::F64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorrowKind {
    Shared,
    Unique,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeWrapper {
    /// Fixed-size array with element count.
    Array(usize),
    Borrow(BorrowKind),
    Pointer(BorrowKind),
    /// Always the bottom wrapper.
    Slice,
}

/// Index into the module tree's interned data-type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub usize);

/// A type reference: outermost-first wrapper list over an inner type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub wrappers: Vec<TypeWrapper>,
    pub inner: RawType,
    pub composite: Option<TypeId>,
}

impl TypeRef {
    pub fn unit() -> TypeRef {
        TypeRef::from_raw(RawType::Unit)
    }

    pub fn diverge() -> TypeRef {
        TypeRef::from_raw(RawType::Unreachable)
    }

    pub fn from_raw(inner: RawType) -> TypeRef {
        TypeRef {
            wrappers: Vec::new(),
            inner,
            composite: None,
        }
    }

    pub fn composite(id: TypeId) -> TypeRef {
        TypeRef {
            wrappers: Vec::new(),
            inner: RawType::Composite,
            composite: Some(id),
        }
    }

    pub fn trait_object() -> TypeRef {
        TypeRef {
            wrappers: Vec::new(),
            inner: RawType::TraitObject,
            composite: None,
        }
    }

    /// Add `w` as the new outermost wrapper.
    pub fn wrapped(mut self, w: TypeWrapper) -> TypeRef {
        self.wrappers.insert(0, w);
        self
    }

    pub fn wrapper(&self) -> Option<&TypeWrapper> {
        self.wrappers.first()
    }

    /// Strip the outermost wrapper.
    pub fn get_inner(&self) -> TypeRef {
        TypeRef {
            wrappers: self.wrappers[1..].to_vec(),
            inner: self.inner,
            composite: self.composite,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self.wrapper(),
            Some(TypeWrapper::Borrow(_)) | Some(TypeWrapper::Pointer(_))
        ) || (self.wrappers.is_empty() && self.inner == RawType::Function)
    }

    /// The metadata type a pointer to this type carries, if unsized.
    pub fn meta_type(&self, tree: &module::ModuleTree) -> Option<TypeRef> {
        match self.wrapper() {
            Some(TypeWrapper::Slice) => Some(TypeRef::from_raw(RawType::USize)),
            Some(_) => None,
            None => match self.inner {
                RawType::Str => Some(TypeRef::from_raw(RawType::USize)),
                RawType::TraitObject => {
                    Some(TypeRef::from_raw(RawType::USize).wrapped(TypeWrapper::Pointer(
                        BorrowKind::Shared,
                    )))
                }
                RawType::Composite => {
                    let _ = tree;
                    None
                }
                _ => None,
            },
        }
    }

    /// True when the metadata is an element count.
    pub fn has_slice_meta(&self) -> bool {
        matches!(self.wrapper(), Some(TypeWrapper::Slice))
            || (self.wrappers.is_empty() && self.inner == RawType::Str)
    }

    /// Byte size; `None` for unsized types.
    pub fn size(&self, tree: &module::ModuleTree) -> Option<usize> {
        match self.wrapper() {
            Some(TypeWrapper::Array(n)) => Some(self.get_inner().size(tree)? * n),
            Some(TypeWrapper::Slice) => None,
            Some(TypeWrapper::Borrow(_)) | Some(TypeWrapper::Pointer(_)) => {
                let pointee = self.get_inner();
                if pointee.meta_type(tree).is_some() {
                    Some(POINTER_SIZE * 2)
                } else {
                    Some(POINTER_SIZE)
                }
            }
            None => match self.inner {
                RawType::Composite => {
                    let id = self.composite.expect("composite type without id");
                    let dt = tree.data_type(id);
                    if dt.alignment == 0 {
                        None
                    } else {
                        Some(dt.size)
                    }
                }
                other => other.size(),
            },
        }
    }

    /// Field offset and type, for composite field / downcast projections.
    pub fn get_field(&self, idx: usize, tree: &module::ModuleTree) -> EResult<(usize, TypeRef)> {
        match self.wrapper() {
            Some(TypeWrapper::Array(_)) | Some(TypeWrapper::Slice) => {
                let inner = self.get_inner();
                let esz = inner
                    .size(tree)
                    .ok_or_else(|| EvalError::TypeError("unsized array element".into()))?;
                Ok((esz * idx, inner))
            }
            Some(_) => Err(EvalError::TypeError(format!(
                "field access on non-composite {}",
                self
            ))),
            None => {
                if self.inner != RawType::Composite {
                    return Err(EvalError::TypeError(format!(
                        "field access on non-composite {}",
                        self
                    )));
                }
                let id = self.composite.expect("composite type without id");
                let dt = tree.data_type(id);
                let (ofs, ty) = dt.fields.get(idx).ok_or_else(|| {
                    EvalError::TypeError(format!("field index {} out of range", idx))
                })?;
                Ok((*ofs, ty.clone()))
            }
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for w in &self.wrappers {
            match w {
                TypeWrapper::Array(n) => write!(f, "[{}; ", n)?,
                TypeWrapper::Slice => write!(f, "[")?,
                TypeWrapper::Borrow(BorrowKind::Shared) => write!(f, "&")?,
                TypeWrapper::Borrow(BorrowKind::Unique) => write!(f, "&mut ")?,
                TypeWrapper::Borrow(BorrowKind::Move) => write!(f, "&move ")?,
                TypeWrapper::Pointer(BorrowKind::Shared) => write!(f, "*const ")?,
                TypeWrapper::Pointer(BorrowKind::Unique) => write!(f, "*mut ")?,
                TypeWrapper::Pointer(BorrowKind::Move) => write!(f, "*move ")?,
            }
        }
        match self.inner {
            RawType::Composite => match self.composite {
                Some(id) => write!(f, "composite#{}", id.0)?,
                None => write!(f, "composite#?")?,
            },
            RawType::Unit => write!(f, "()")?,
            RawType::Unreachable => write!(f, "!")?,
            RawType::Function => write!(f, "fn")?,
            RawType::TraitObject => write!(f, "dyn")?,
            RawType::Bool => write!(f, "bool")?,
            RawType::Char => write!(f, "char")?,
            RawType::Str => write!(f, "str")?,
            RawType::U8 => write!(f, "u8")?,
            RawType::U16 => write!(f, "u16")?,
            RawType::U32 => write!(f, "u32")?,
            RawType::U64 => write!(f, "u64")?,
            RawType::U128 => write!(f, "u128")?,
            RawType::USize => write!(f, "usize")?,
            RawType::I8 => write!(f, "i8")?,
            RawType::I16 => write!(f, "i16")?,
            RawType::I32 => write!(f, "i32")?,
            RawType::I64 => write!(f, "i64")?,
            RawType::I128 => write!(f, "i128")?,
            RawType::ISize => write!(f, "isize")?,
            RawType::F32 => write!(f, "f32")?,
            RawType::F64 => write!(f, "f64")?,
        }
        for w in &self.wrappers {
            match w {
                TypeWrapper::Array(_) | TypeWrapper::Slice => write!(f, "]")?,
                _ => {}
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SimplePath {
    pub crate_name: String,
    pub components: Vec<String>,
}

impl SimplePath {
    pub fn new(crate_name: &str, components: &[&str]) -> SimplePath {
        SimplePath {
            crate_name: crate_name.to_string(),
            components: components.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn last(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }
}

impl fmt::Display for SimplePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "::\"{}\"", self.crate_name)?;
        for c in &self.components {
            write!(f, "::{}", c)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GenericPath {
    pub path: SimplePath,
    pub params: Vec<TypeRef>,
}

impl fmt::Display for GenericPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if !self.params.is_empty() {
            write!(f, "<")?;
            for (i, t) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", t)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Path {
    Simple(GenericPath),
    /// `<Type as Trait>::name<...>`
    Ufcs {
        ty: TypeRef,
        trait_path: Option<GenericPath>,
        name: String,
        params: Vec<TypeRef>,
    },
}

impl Path {
    pub fn simple(crate_name: &str, components: &[&str]) -> Path {
        Path::Simple(GenericPath {
            path: SimplePath::new(crate_name, components),
            params: Vec::new(),
        })
    }

    /// Trailing item name, for extern-shim dispatch.
    pub fn item_name(&self) -> Option<&str> {
        match self {
            Path::Simple(gp) => gp.path.last(),
            Path::Ufcs { name, .. } => Some(name),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Simple(gp) => write!(f, "{}", gp),
            Path::Ufcs {
                ty,
                trait_path,
                name,
                ..
            } => {
                write!(f, "<{}", ty)?;
                if let Some(t) = trait_path {
                    write!(f, " as {}", t)?;
                }
                write!(f, ">::{}", name)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum LValue {
    Return,
    Local(usize),
    Argument(usize),
    Static(Path),
    Field {
        base: Box<LValue>,
        idx: usize,
    },
    Downcast {
        base: Box<LValue>,
        variant: usize,
    },
    Deref(Box<LValue>),
    Index {
        base: Box<LValue>,
        idx: Box<LValue>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int { v: i64, ty: RawType },
    Uint { v: u64, ty: RawType },
    Bool(bool),
    Str(String),
    ItemAddr(Box<Path>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Const(Constant),
    LValue(LValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniOp {
    /// Bitwise/logical invert.
    Inv,
    /// Two's-complement negate.
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// `^`-suffixed forms return `(T, overflowed)`.
    AddOv,
    SubOv,
    MulOv,
    DivOv,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RValue {
    Use(LValue),
    Const(Constant),
    Borrow {
        kind: BorrowKind,
        val: LValue,
    },
    Cast {
        val: LValue,
        ty: TypeRef,
    },
    UniOp {
        op: UniOp,
        val: LValue,
    },
    BinOp {
        lhs: Param,
        op: BinOp,
        rhs: Param,
    },
    Tuple(Vec<Param>),
    Array(Vec<Param>),
    SizedArray {
        val: Param,
        count: usize,
    },
    Struct {
        path: GenericPath,
        fields: Vec<Param>,
    },
    Variant {
        path: GenericPath,
        index: usize,
        val: Param,
    },
    /// Fabricate a fat pointer from a thin pointer and metadata.
    MakeDst {
        ptr: Param,
        meta: Param,
    },
    DstPtr(LValue),
    DstMeta(LValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    Deep,
    Shallow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropFlagSrc {
    Const(bool),
    Flag(usize),
    InvFlag(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign {
        dst: LValue,
        src: RValue,
    },
    SetDropFlag {
        idx: usize,
        src: DropFlagSrc,
    },
    Drop {
        kind: DropKind,
        slot: LValue,
        flag: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    Path(Path),
    Intrinsic { name: String, params: Vec<TypeRef> },
    Value(LValue),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Goto(usize),
    Return,
    /// Jump to the cleanup block with the panic flag raised.
    Panic { cleanup: usize },
    Diverge,
    If {
        cond: LValue,
        bb_true: usize,
        bb_false: usize,
    },
    /// Variant switch: one target per variant of the scrutinee's type.
    Switch {
        val: LValue,
        targets: Vec<usize>,
    },
    /// Value switch with a default edge.
    SwitchValue {
        val: LValue,
        values: Vec<u64>,
        targets: Vec<usize>,
        default: usize,
    },
    Call {
        dst_block: usize,
        panic_block: usize,
        dst: LValue,
        target: CallTarget,
        args: Vec<Param>,
    },
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub statements: Vec<Statement>,
    pub terminator: Terminator,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionBody {
    pub locals: Vec<TypeRef>,
    pub drop_flags: Vec<bool>,
    pub blocks: Vec<BasicBlock>,
}

#[derive(Debug, Clone)]
pub enum FnKind {
    Local(FunctionBody),
    /// Declaration resolved against the interpreter's extern catalog.
    External { link_name: String, abi: String },
}

#[derive(Debug, Clone)]
pub struct Function {
    pub args: Vec<TypeRef>,
    pub ret: TypeRef,
    pub kind: FnKind,
}

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Which bytes carry a variant's discriminant, and the bytes to expect.
#[derive(Debug, Clone)]
pub struct VariantValue {
    pub base_field: usize,
    pub field_path: Vec<usize>,
    pub tag_data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct DataType {
    /// Zero alignment marks a forward-declared placeholder.
    pub alignment: usize,
    pub size: usize,
    pub fields: Vec<(usize, TypeRef)>,
    pub variants: Vec<VariantValue>,
}

impl DataType {
    pub fn is_populated(&self) -> bool {
        self.alignment != 0
    }
}
