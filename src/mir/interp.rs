//! Interpreter core: per-thread call stack, statement and terminator
//! stepping, call dispatch, drop glue, panic propagation.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::module::ModuleTree;
use super::primitive::{Overflow, PrimitiveValue};
use super::value::{AllocHandle, RelocTarget, Value, ValueRef};
use super::{
    BinOp, CallTarget, Constant, DropFlagSrc, DropKind, EResult, EvalError, FnKind, Function,
    FunctionBody, LValue, Param, Path, RValue, RawType, Statement, Terminator, TypeRef,
    TypeWrapper, UniOp, POINTER_SIZE,
};

/// TLS keys are process-wide, handed out by an incrementing counter.
static NEXT_TLS_KEY: AtomicUsize = AtomicUsize::new(1);

pub fn alloc_tls_key() -> usize {
    NEXT_TLS_KEY.fetch_add(1, Ordering::SeqCst)
}

/// Per-thread interpreter state: TLS slots and the panic machinery.
#[derive(Default)]
pub struct ThreadState {
    pub tls: Vec<Option<Value>>,
    pub panic_active: bool,
    pub panic_count: u32,
    pub panic_value: Option<Value>,
    /// Interned type identities for `type_id`.
    pub type_ids: HashMap<TypeRef, u64>,
    /// Lazily created `errno` slot for `__errno_location`.
    pub errno: Option<AllocHandle>,
}

impl ThreadState {
    pub fn new() -> ThreadState {
        ThreadState::default()
    }

    pub fn tls_get(&self, key: usize) -> Option<&Value> {
        self.tls.get(key).and_then(|v| v.as_ref())
    }

    pub fn tls_set(&mut self, key: usize, value: Option<Value>) {
        if self.tls.len() <= key {
            self.tls.resize_with(key + 1, || None);
        }
        self.tls[key] = value;
    }

    pub fn type_id_of(&mut self, ty: &TypeRef) -> u64 {
        let next = self.type_ids.len() as u64 + 1;
        *self.type_ids.entry(ty.clone()).or_insert(next)
    }
}

/// Callback run when the frame above a wrapper returns (or unwinds).
pub type WrapperCb = Box<dyn FnMut(&mut ThreadState, Value) -> EResult<Value>>;

enum Frame {
    Mir(StackFrame),
    /// Synthetic frame that intercepts the return of the frame above.
    Wrapper { cb: WrapperCb },
}

pub struct StackFrame {
    path: Path,
    fcn: Rc<Function>,
    ret: Value,
    args: Vec<Value>,
    locals: Vec<Value>,
    drop_flags: Vec<bool>,
    bb_idx: usize,
    stmt_idx: usize,
}

impl StackFrame {
    fn body(&self) -> &FunctionBody {
        match &self.fcn.kind {
            FnKind::Local(body) => body,
            FnKind::External { .. } => unreachable!("frame for an external function"),
        }
    }
}

pub struct InterpreterThread<'m> {
    tree: &'m ModuleTree,
    pub thread: ThreadState,
    stack: Vec<Frame>,
}

impl<'m> InterpreterThread<'m> {
    pub fn new(tree: &'m ModuleTree) -> InterpreterThread<'m> {
        InterpreterThread {
            tree,
            thread: ThreadState::new(),
            stack: Vec::new(),
        }
    }

    pub fn with_tls(tree: &'m ModuleTree, tls: Vec<Option<Value>>) -> InterpreterThread<'m> {
        let mut t = InterpreterThread::new(tree);
        t.thread.tls = tls;
        t
    }

    pub fn tree(&self) -> &'m ModuleTree {
        self.tree
    }

    /// Push the root frame for `path`.
    pub fn start(&mut self, path: &Path, args: Vec<Value>) -> EResult<()> {
        let fcn = self
            .tree
            .get_function(path)
            .ok_or_else(|| EvalError::MissingFunction(path.to_string()))?;
        self.push_fcn_frame(path.clone(), fcn, args)
    }

    fn push_fcn_frame(&mut self, path: Path, fcn: Rc<Function>, args: Vec<Value>) -> EResult<()> {
        let body = match &fcn.kind {
            FnKind::Local(body) => body,
            FnKind::External { .. } => {
                return Err(EvalError::TypeError(format!(
                    "cannot push a frame for external {}",
                    path
                )))
            }
        };
        if args.len() != fcn.args.len() {
            return Err(EvalError::TypeError(format!(
                "{} expects {} arguments, got {}",
                path,
                fcn.args.len(),
                args.len()
            )));
        }
        let ret_size = fcn.ret.size(self.tree).unwrap_or(0);
        let locals = body
            .locals
            .iter()
            .map(|ty| Value::new_direct(ty.size(self.tree).unwrap_or(0)))
            .collect();
        let drop_flags = body.drop_flags.clone();
        self.stack.push(Frame::Mir(StackFrame {
            path,
            fcn: fcn.clone(),
            ret: Value::new_direct(ret_size),
            args,
            locals,
            drop_flags,
            bb_idx: 0,
            stmt_idx: 0,
        }));
        Ok(())
    }

    /// Run to completion; the thread result is the root return slot.
    pub fn run(&mut self) -> EResult<Value> {
        loop {
            if let Some(result) = self.step_one()? {
                if self.thread.panic_active {
                    return Err(EvalError::Panicked);
                }
                return Ok(result);
            }
        }
    }

    /// `path → block#:stmt#` for every live frame, innermost first.
    pub fn backtrace(&self) -> String {
        let mut out = String::new();
        for frame in self.stack.iter().rev() {
            match frame {
                Frame::Mir(f) => {
                    out.push_str(&format!("  {} -> {}:{}\n", f.path, f.bb_idx, f.stmt_idx))
                }
                Frame::Wrapper { .. } => out.push_str("  <wrapper>\n"),
            }
        }
        out
    }

    /// Execute one statement or terminator. `Some(value)` when the thread
    /// has terminated.
    pub fn step_one(&mut self) -> EResult<Option<Value>> {
        enum Work {
            Stmt(Statement),
            Term(Terminator),
        }
        let work = {
            let frame = self.top_frame()?;
            let body = frame.body();
            let block = body
                .blocks
                .get(frame.bb_idx)
                .ok_or_else(|| EvalError::Unreachable(format!("block {} missing", frame.bb_idx)))?;
            if frame.stmt_idx < block.statements.len() {
                Work::Stmt(block.statements[frame.stmt_idx].clone())
            } else {
                Work::Term(block.terminator.clone())
            }
        };

        match work {
            Work::Stmt(stmt) => {
                self.exec_statement(&stmt)?;
                self.top_frame()?.stmt_idx += 1;
                Ok(None)
            }
            Work::Term(term) => self.exec_terminator(&term),
        }
    }

    fn top_frame(&mut self) -> EResult<&mut StackFrame> {
        match self.stack.last_mut() {
            Some(Frame::Mir(f)) => Ok(f),
            Some(Frame::Wrapper { .. }) => Err(EvalError::Unreachable(
                "wrapper frame at top of stack".into(),
            )),
            None => Err(EvalError::Unreachable("empty call stack".into())),
        }
    }

    fn helpers(&mut self) -> EResult<MirHelpers<'_, 'm>> {
        let tree = self.tree;
        match self.stack.last_mut() {
            Some(Frame::Mir(frame)) => Ok(MirHelpers { tree, frame }),
            _ => Err(EvalError::Unreachable("no MIR frame".into())),
        }
    }

    fn exec_statement(&mut self, stmt: &Statement) -> EResult<()> {
        match stmt {
            Statement::Assign { dst, src } => {
                let mut h = self.helpers()?;
                let (dst_ref, dst_ty) = h.get_value_and_type(dst)?;
                let val = h.eval_rvalue(src, &dst_ty)?;
                dst_ref.write_value(0, &val)
            }
            Statement::SetDropFlag { idx, src } => {
                let frame = self.top_frame()?;
                let v = match src {
                    DropFlagSrc::Const(b) => *b,
                    DropFlagSrc::Flag(i) => frame.drop_flags[*i],
                    DropFlagSrc::InvFlag(i) => !frame.drop_flags[*i],
                };
                frame.drop_flags[*idx] = v;
                Ok(())
            }
            Statement::Drop { kind, slot, flag } => {
                let run = match flag {
                    Some(i) => self.top_frame()?.drop_flags[*i],
                    None => true,
                };
                if run {
                    let mut h = self.helpers()?;
                    let (slot_ref, ty) = h.get_value_and_type(slot)?;
                    drop_value(self.tree, &slot_ref, &ty, *kind == DropKind::Shallow)?;
                }
                Ok(())
            }
        }
    }

    fn exec_terminator(&mut self, term: &Terminator) -> EResult<Option<Value>> {
        match term {
            Terminator::Goto(bb) => {
                self.jump(*bb)?;
                Ok(None)
            }
            Terminator::Return => {
                let result = {
                    let frame = self.top_frame()?;
                    frame.ret.clone()
                };
                self.pop_stack(result)
            }
            Terminator::Panic { cleanup } => {
                self.thread.panic_active = true;
                self.jump(*cleanup)?;
                Ok(None)
            }
            Terminator::Diverge => {
                // Unwinding continues into the caller.
                self.thread.panic_active = true;
                self.pop_stack(Value::new_unit())
            }
            Terminator::If {
                cond,
                bb_true,
                bb_false,
            } => {
                let v = {
                    let mut h = self.helpers()?;
                    let (r, _) = h.get_value_and_type(cond)?;
                    let mut b = [0u8; 1];
                    r.read_bytes(0, &mut b)?;
                    b[0] != 0
                };
                self.jump(if v { *bb_true } else { *bb_false })?;
                Ok(None)
            }
            Terminator::Switch { val, targets } => {
                let idx = {
                    let mut h = self.helpers()?;
                    let (r, ty) = h.get_value_and_type(val)?;
                    variant_index(self.tree, &r, &ty)?
                };
                let bb = *targets.get(idx).ok_or_else(|| {
                    EvalError::Unreachable(format!("switch has no arm for variant {}", idx))
                })?;
                self.jump(bb)?;
                Ok(None)
            }
            Terminator::SwitchValue {
                val,
                values,
                targets,
                default,
            } => {
                let v = {
                    let mut h = self.helpers()?;
                    let (r, ty) = h.get_value_and_type(val)?;
                    let prim = PrimitiveValue::from_value(ty.inner, &r)?;
                    prim.as_u128() as u64
                };
                let bb = values
                    .iter()
                    .position(|&cand| cand == v)
                    .map(|i| targets[i])
                    .unwrap_or(*default);
                self.jump(bb)?;
                Ok(None)
            }
            Terminator::Call {
                dst_block,
                panic_block,
                dst,
                target,
                args,
            } => self.exec_call(*dst_block, *panic_block, dst, target, args),
        }
    }

    fn jump(&mut self, bb: usize) -> EResult<()> {
        let frame = self.top_frame()?;
        frame.bb_idx = bb;
        frame.stmt_idx = 0;
        Ok(())
    }

    fn exec_call(
        &mut self,
        dst_block: usize,
        panic_block: usize,
        dst: &LValue,
        target: &CallTarget,
        args: &[Param],
    ) -> EResult<Option<Value>> {
        let mut arg_vals = Vec::with_capacity(args.len());
        {
            let mut h = self.helpers()?;
            for p in args {
                arg_vals.push(h.param_to_value(p)?.0);
            }
        }

        match target {
            CallTarget::Intrinsic { name, params } => {
                if name == "try" {
                    return self.call_try(arg_vals).map(|()| None);
                }
                let ret = {
                    let mut ctx = CallCtx {
                        tree: self.tree,
                        thread: &mut self.thread,
                    };
                    super::intrinsics::call_intrinsic(&mut ctx, name, params, arg_vals)?
                };
                self.finish_immediate_call(dst, ret, dst_block, panic_block)
            }
            CallTarget::Path(path) => self.call_path(path, arg_vals, dst, dst_block, panic_block),
            CallTarget::Value(lv) => {
                let path = {
                    let mut h = self.helpers()?;
                    let (r, _) = h.get_value_and_type(lv)?;
                    match r.get_relocation(0) {
                        Some(RelocTarget::Function(p)) => (*p).clone(),
                        Some(_) => {
                            return Err(EvalError::TypeError(
                                "call through a non-function pointer".into(),
                            ))
                        }
                        None => return Err(EvalError::MissingRelocation),
                    }
                };
                self.call_path(&path, arg_vals, dst, dst_block, panic_block)
            }
        }
    }

    fn call_path(
        &mut self,
        path: &Path,
        args: Vec<Value>,
        dst: &LValue,
        dst_block: usize,
        panic_block: usize,
    ) -> EResult<Option<Value>> {
        if let Some(fcn) = self.tree.get_function(path) {
            match &fcn.kind {
                FnKind::Local(_) => {
                    self.push_fcn_frame(path.clone(), fcn.clone(), args)?;
                    return Ok(None);
                }
                FnKind::External { link_name, .. } => {
                    let link_name = link_name.clone();
                    return self.call_extern(&link_name, args, dst, dst_block, panic_block);
                }
            }
        }
        // Undeclared externals: the IR assumes the catalog exists, so a
        // simple path's trailing name is tried against it before failing.
        if let Some(name) = path.item_name() {
            if super::ffi::is_known_extern(name) {
                let name = name.to_string();
                return self.call_extern(&name, args, dst, dst_block, panic_block);
            }
        }
        Err(EvalError::MissingFunction(path.to_string()))
    }

    fn call_extern(
        &mut self,
        link_name: &str,
        args: Vec<Value>,
        dst: &LValue,
        dst_block: usize,
        panic_block: usize,
    ) -> EResult<Option<Value>> {
        if link_name == "__rust_maybe_catch_panic" {
            // (f, data, data_ptr, vtable_ptr) - same shape as `try`.
            return self.call_try(args).map(|()| None);
        }
        if link_name == "pthread_create" {
            return self
                .extern_pthread_create(args, dst, dst_block)
                .map(|()| None);
        }
        let ret = {
            let mut ctx = CallCtx {
                tree: self.tree,
                thread: &mut self.thread,
            };
            super::ffi::call_extern(&mut ctx, link_name, args)?
        };
        self.finish_immediate_call(dst, ret, dst_block, panic_block)
    }

    fn finish_immediate_call(
        &mut self,
        dst: &LValue,
        ret: Value,
        dst_block: usize,
        panic_block: usize,
    ) -> EResult<Option<Value>> {
        if self.thread.panic_active {
            self.jump(panic_block)?;
            return Ok(None);
        }
        let mut h = self.helpers()?;
        let (dst_ref, _) = h.get_value_and_type(dst)?;
        if ret.size() > 0 {
            dst_ref.write_value(0, &ret)?;
        }
        self.jump(dst_block)?;
        Ok(None)
    }

    /// `try(f, data, local_ptr)`: run `f(data)` under a wrapper frame that
    /// converts a panic into a status-1 return and moves the payload out.
    fn call_try(&mut self, mut args: Vec<Value>) -> EResult<()> {
        if args.len() < 3 {
            return Err(EvalError::TypeError("try needs three arguments".into()));
        }
        let out_ptr = args[2].clone();
        let data = args.remove(1);
        let f = args.remove(0);

        let fn_path = match f.get_relocation(0) {
            Some(RelocTarget::Function(p)) => (*p).clone(),
            _ => return Err(EvalError::TypeError("try callee is not a function".into())),
        };

        self.stack.push(Frame::Wrapper {
            cb: Box::new(move |thread, _result| {
                if thread.panic_active {
                    thread.panic_active = false;
                    let payload = thread.panic_value.take().unwrap_or_else(Value::new_unit);
                    // Move the payload through the caller-provided slot.
                    if let Some(RelocTarget::Alloc(a)) = out_ptr.get_relocation(0) {
                        let ofs = out_ptr.read_usize(0)? as usize;
                        a.borrow_mut().write_value(ofs, &payload)?;
                    }
                    Ok(Value::new_i32(1))
                } else {
                    Ok(Value::new_i32(0))
                }
            }),
        });

        let fcn = self
            .tree
            .get_function(&fn_path)
            .ok_or_else(|| EvalError::MissingFunction(fn_path.to_string()))?;
        let argc = fcn.args.len().min(1);
        let call_args = if argc == 1 { vec![data] } else { Vec::new() };
        self.push_fcn_frame(fn_path, fcn, call_args)
    }

    /// `pthread_create` runs the spawned body synchronously with a saved and
    /// restored TLS vector; there is no real concurrency.
    fn extern_pthread_create(
        &mut self,
        args: Vec<Value>,
        dst: &LValue,
        dst_block: usize,
    ) -> EResult<()> {
        if args.len() < 4 {
            return Err(EvalError::TypeError(
                "pthread_create needs four arguments".into(),
            ));
        }
        let start_routine = &args[2];
        let start_arg = args[3].clone();
        let fn_path = match start_routine.get_relocation(0) {
            Some(RelocTarget::Function(p)) => (*p).clone(),
            _ => {
                return Err(EvalError::TypeError(
                    "pthread_create start routine is not a function".into(),
                ))
            }
        };

        let saved_tls = std::mem::take(&mut self.thread.tls);
        let mut sub = InterpreterThread::with_tls(self.tree, Vec::new());
        sub.start(&fn_path, vec![start_arg])?;
        let run_result = sub.run();
        self.thread.tls = saved_tls;
        run_result?;

        // Write the thread handle out and report success.
        {
            let mut h = self.helpers()?;
            let (dst_ref, _) = h.get_value_and_type(dst)?;
            dst_ref.write_value(0, &Value::new_i32(0))?;
        }
        if let Some(RelocTarget::Alloc(a)) = args[0].get_relocation(0) {
            let ofs = args[0].read_usize(0)? as usize;
            a.borrow_mut().write_usize(ofs, 1)?;
        }
        self.jump(dst_block)?;
        Ok(())
    }

    /// Pop the returning frame and deliver `result` downwards, running
    /// wrapper callbacks and panic edges on the way.
    fn pop_stack(&mut self, mut result: Value) -> EResult<Option<Value>> {
        self.stack.pop();
        loop {
            if self.stack.is_empty() {
                return Ok(Some(result));
            }
            if matches!(self.stack.last(), Some(Frame::Wrapper { .. })) {
                let mut cb = match self.stack.pop() {
                    Some(Frame::Wrapper { cb }) => cb,
                    _ => unreachable!(),
                };
                result = cb(&mut self.thread, result)?;
                continue;
            }

            // A MIR caller: its current terminator is the Call that
            // suspended it.
            let (dst_block, panic_block, dst) = {
                let caller = self.top_frame()?;
                let term = caller.body().blocks[caller.bb_idx].terminator.clone();
                match term {
                    Terminator::Call {
                        dst_block,
                        panic_block,
                        dst,
                        ..
                    } => (dst_block, panic_block, dst),
                    other => {
                        return Err(EvalError::Unreachable(format!(
                            "return into non-call terminator {:?}",
                            other
                        )))
                    }
                }
            };
            if self.thread.panic_active {
                self.jump(panic_block)?;
            } else {
                {
                    let mut h = self.helpers()?;
                    let (dst_ref, _) = h.get_value_and_type(&dst)?;
                    if result.size() > 0 {
                        dst_ref.write_value(0, &result)?;
                    }
                }
                self.jump(dst_block)?;
            }
            return Ok(None);
        }
    }
}

/// Shared context handed to the intrinsic and extern catalogs.
pub struct CallCtx<'a, 'm> {
    pub tree: &'m ModuleTree,
    pub thread: &'a mut ThreadState,
}

/// Structural drop glue: recurse composites, skip borrows, invalidate the
/// dropped bytes.
pub fn drop_value(
    tree: &ModuleTree,
    v: &ValueRef,
    ty: &TypeRef,
    shallow: bool,
) -> EResult<()> {
    if !shallow {
        match ty.wrapper() {
            Some(TypeWrapper::Borrow(_)) | Some(TypeWrapper::Pointer(_)) => {}
            Some(TypeWrapper::Array(n)) => {
                let elem = ty.get_inner();
                if let Some(esz) = elem.size(tree) {
                    for i in 0..*n {
                        let er = ValueRef {
                            alloc: v.alloc.clone(),
                            offset: v.offset + i * esz,
                            size: esz,
                            metadata: None,
                        };
                        drop_value(tree, &er, &elem, false)?;
                    }
                }
            }
            Some(TypeWrapper::Slice) => {}
            None => {
                if ty.inner == RawType::Composite {
                    let id = ty.composite.expect("composite without id");
                    let dt = tree.data_type(id);
                    for (ofs, fty) in &dt.fields {
                        if let Some(fsz) = fty.size(tree) {
                            let fr = ValueRef {
                                alloc: v.alloc.clone(),
                                offset: v.offset + ofs,
                                size: fsz,
                                metadata: None,
                            };
                            drop_value(tree, &fr, fty, false)?;
                        }
                    }
                }
            }
        }
    }
    v.mark_bytes_invalid();
    Ok(())
}

/// Resolve which variant an enum value currently inhabits by matching tag
/// bytes; an empty tag pattern is the "no tag" fallback variant.
pub fn variant_index(tree: &ModuleTree, v: &ValueRef, ty: &TypeRef) -> EResult<usize> {
    if ty.inner != RawType::Composite || !ty.wrappers.is_empty() {
        // A raw integer scrutinee switches on its value directly.
        let prim = PrimitiveValue::from_value(ty.inner, v)?;
        return Ok(prim.as_u128() as usize);
    }
    let id = ty.composite.expect("composite without id");
    let dt = tree.data_type(id);
    let mut fallback = None;
    for (idx, variant) in dt.variants.iter().enumerate() {
        if variant.tag_data.is_empty() {
            fallback = Some(idx);
            continue;
        }
        let (mut ofs, mut fty) = match dt.fields.get(variant.base_field) {
            Some((o, t)) => (*o, t.clone()),
            None => continue,
        };
        for &p in &variant.field_path {
            let (o2, t2) = fty.get_field(p, tree)?;
            ofs += o2;
            fty = t2;
        }
        let mut buf = vec![0u8; variant.tag_data.len()];
        if v.read_bytes(ofs, &mut buf).is_err() {
            continue;
        }
        if buf == variant.tag_data {
            return Ok(idx);
        }
    }
    fallback.ok_or_else(|| EvalError::Unreachable("no variant matched the tag bytes".into()))
}

// ---------------------------------------------------------------------------
// LValue/RValue evaluation
// ---------------------------------------------------------------------------

pub struct MirHelpers<'a, 'm> {
    pub tree: &'m ModuleTree,
    pub frame: &'a mut StackFrame,
}

impl<'a, 'm> MirHelpers<'a, 'm> {
    pub fn get_value_and_type(&mut self, lv: &LValue) -> EResult<(ValueRef, TypeRef)> {
        match lv {
            LValue::Return => {
                let ty = self.frame.fcn.ret.clone();
                let size = self.frame.ret.size();
                let alloc = self.frame.ret.create_allocation();
                Ok((ValueRef::new(alloc, 0, size), ty))
            }
            LValue::Local(i) => {
                let ty = self
                    .frame
                    .body()
                    .locals
                    .get(*i)
                    .cloned()
                    .ok_or_else(|| EvalError::Unreachable(format!("local {} missing", i)))?;
                let val = &mut self.frame.locals[*i];
                let size = val.size();
                let alloc = val.create_allocation();
                Ok((ValueRef::new(alloc, 0, size), ty))
            }
            LValue::Argument(i) => {
                let ty = self
                    .frame
                    .fcn
                    .args
                    .get(*i)
                    .cloned()
                    .ok_or_else(|| EvalError::Unreachable(format!("argument {} missing", i)))?;
                let val = &mut self.frame.args[*i];
                let size = val.size();
                let alloc = val.create_allocation();
                Ok((ValueRef::new(alloc, 0, size), ty))
            }
            LValue::Static(p) => {
                let sv = self
                    .tree
                    .get_static(p)
                    .ok_or_else(|| EvalError::MissingStatic(p.to_string()))?;
                let alloc = sv
                    .val
                    .backing_alloc()
                    .expect("statics are allocation-backed at load");
                let size = alloc.size();
                Ok((ValueRef::new(alloc, 0, size), sv.ty.clone()))
            }
            LValue::Field { base, idx } | LValue::Downcast { base, variant: idx } => {
                let (mut base_ref, base_ty) = self.get_value_and_type(base)?;
                let (ofs, fty) = base_ty.get_field(*idx, self.tree)?;
                base_ref.offset += ofs;
                if let Some(fsz) = fty.size(self.tree) {
                    if base_ref.size < ofs + fsz {
                        return Err(EvalError::SizeMismatch {
                            expected: ofs + fsz,
                            got: base_ref.size,
                        });
                    }
                    base_ref.size = fsz;
                    base_ref.metadata = None;
                } else {
                    base_ref.size -= ofs;
                }
                Ok((base_ref, fty))
            }
            LValue::Index { base, idx } => {
                let idx_val = {
                    let (r, _) = self.get_value_and_type(idx)?;
                    r.read_usize(0)? as usize
                };
                let (mut base_ref, base_ty) = self.get_value_and_type(base)?;
                let elem = base_ty.get_inner();
                let esz = elem
                    .size(self.tree)
                    .ok_or_else(|| EvalError::TypeError("indexing unsized elements".into()))?;
                let count = match base_ty.wrapper() {
                    Some(TypeWrapper::Array(n)) => *n,
                    Some(TypeWrapper::Slice) => match &base_ref.metadata {
                        Some(meta) => meta.read_usize(0)? as usize,
                        None => base_ref.size / esz.max(1),
                    },
                    _ => {
                        return Err(EvalError::TypeError(format!(
                            "indexing non-array {}",
                            base_ty
                        )))
                    }
                };
                if idx_val >= count {
                    return Err(EvalError::OutOfBounds {
                        ofs: idx_val,
                        size: 1,
                        limit: count,
                    });
                }
                base_ref.offset += esz * idx_val;
                base_ref.size = esz;
                base_ref.metadata = None;
                Ok((base_ref, elem))
            }
            LValue::Deref(inner) => {
                let (ptr_ref, ptr_ty) = self.get_value_and_type(inner)?;
                let ty = ptr_ty.get_inner();
                let ofs = ptr_ref.read_usize(0)? as usize;
                let target = ptr_ref
                    .get_relocation(0)
                    .ok_or(EvalError::MissingRelocation)?;
                let alloc = match target {
                    RelocTarget::Alloc(a) => a,
                    RelocTarget::Function(_) => {
                        return Err(EvalError::TypeError(
                            "dereference of a function pointer".into(),
                        ))
                    }
                    RelocTarget::Ffi(m) => {
                        return Err(EvalError::Todo(format!(
                            "dereference of host handle {}",
                            m.name
                        )))
                    }
                };
                match ty.meta_type(self.tree) {
                    Some(meta_ty) => {
                        let meta_size = meta_ty.size(self.tree).unwrap_or(POINTER_SIZE);
                        if ptr_ref.size != POINTER_SIZE + meta_size {
                            return Err(EvalError::SizeMismatch {
                                expected: POINTER_SIZE + meta_size,
                                got: ptr_ref.size,
                            });
                        }
                        let meta = ptr_ref.read_value(POINTER_SIZE, meta_size)?;
                        let size = if ty.has_slice_meta() {
                            let count = meta.read_usize(0)? as usize;
                            let esz = match ty.wrapper() {
                                Some(TypeWrapper::Slice) => {
                                    ty.get_inner().size(self.tree).ok_or_else(|| {
                                        EvalError::TypeError("unsized slice element".into())
                                    })?
                                }
                                _ => 1, // str
                            };
                            count * esz
                        } else {
                            // Trait objects cannot be sub-sliced, so the
                            // allocation bound is usable.
                            alloc.size() - ofs
                        };
                        let mut r = ValueRef::new(alloc, ofs, size);
                        r.metadata = Some(Box::new(meta));
                        Ok((r, ty))
                    }
                    None => {
                        if ptr_ref.size < POINTER_SIZE {
                            return Err(EvalError::SizeMismatch {
                                expected: POINTER_SIZE,
                                got: ptr_ref.size,
                            });
                        }
                        let size = ty.size(self.tree).ok_or_else(|| {
                            EvalError::TypeError(format!("deref to unsized {}", ty))
                        })?;
                        Ok((ValueRef::new(alloc, ofs, size), ty))
                    }
                }
            }
        }
    }

    pub fn read_lvalue(&mut self, lv: &LValue) -> EResult<(Value, TypeRef)> {
        let (r, ty) = self.get_value_and_type(lv)?;
        Ok((r.read_whole()?, ty))
    }

    pub fn const_to_value(&mut self, c: &Constant) -> EResult<(Value, TypeRef)> {
        match c {
            Constant::Uint { v, ty } => {
                let size = ty.size().unwrap_or(POINTER_SIZE);
                let mut val = Value::new_direct(size);
                let bytes = (*v as u128).to_le_bytes();
                val.write_bytes(0, &bytes[..size.min(16)])?;
                Ok((val, TypeRef::from_raw(*ty)))
            }
            Constant::Int { v, ty } => {
                let size = ty.size().unwrap_or(POINTER_SIZE);
                let mut val = Value::new_direct(size);
                let bytes = (*v as i128).to_le_bytes();
                val.write_bytes(0, &bytes[..size.min(16)])?;
                Ok((val, TypeRef::from_raw(*ty)))
            }
            Constant::Bool(b) => {
                let mut val = Value::new_direct(1);
                val.write_bytes(0, &[*b as u8])?;
                Ok((val, TypeRef::from_raw(RawType::Bool)))
            }
            Constant::Str(s) => {
                // `&str`: fat pointer to a fresh string allocation.
                let alloc = super::value::AllocHandle::alloc(s.len());
                alloc.borrow_mut().write_bytes(0, s.as_bytes())?;
                let mut val = Value::new_direct(POINTER_SIZE * 2);
                let handle = val.create_allocation();
                handle
                    .borrow_mut()
                    .write_ptr(0, 0, RelocTarget::Alloc(alloc))?;
                handle
                    .borrow_mut()
                    .write_usize(POINTER_SIZE, s.len() as u64)?;
                let ty = TypeRef::from_raw(RawType::Str)
                    .wrapped(TypeWrapper::Borrow(super::BorrowKind::Shared));
                Ok((val, ty))
            }
            Constant::ItemAddr(path) => {
                if self.tree.get_function(path).is_some() {
                    Ok((
                        Value::new_fnptr((**path).clone()),
                        TypeRef::from_raw(RawType::Function),
                    ))
                } else if let Some(sv) = self.tree.get_static(path) {
                    let alloc = sv.val.backing_alloc().expect("static backed");
                    let ty = sv
                        .ty
                        .clone()
                        .wrapped(TypeWrapper::Borrow(super::BorrowKind::Shared));
                    Ok((Value::new_pointer(0, RelocTarget::Alloc(alloc)), ty))
                } else {
                    Err(EvalError::MissingFunction(path.to_string()))
                }
            }
        }
    }

    pub fn param_to_value(&mut self, p: &Param) -> EResult<(Value, TypeRef)> {
        match p {
            Param::Const(c) => self.const_to_value(c),
            Param::LValue(lv) => self.read_lvalue(lv),
        }
    }

    pub fn eval_rvalue(&mut self, rv: &RValue, dst_ty: &TypeRef) -> EResult<Value> {
        match rv {
            RValue::Use(lv) => Ok(self.read_lvalue(lv)?.0),
            RValue::Const(c) => Ok(self.const_to_value(c)?.0),
            RValue::Borrow { kind: _, val } => {
                // Borrowing a function item yields a function pointer.
                if let LValue::Static(p) = val {
                    if self.tree.get_static(p).is_none()
                        && self.tree.get_function(p).is_some()
                    {
                        return Ok(Value::new_fnptr(p.clone()));
                    }
                }
                let (r, _) = self.get_value_and_type(val)?;
                let meta = r.metadata.clone();
                let total = POINTER_SIZE + meta.as_ref().map(|m| m.size()).unwrap_or(0);
                let mut out = Value::new_direct(total);
                let handle = out.create_allocation();
                handle
                    .borrow_mut()
                    .write_ptr(0, r.offset as u64, RelocTarget::Alloc(r.alloc.clone()))?;
                if let Some(meta) = meta {
                    handle.borrow_mut().write_value(POINTER_SIZE, &meta)?;
                }
                Ok(out)
            }
            RValue::Cast { val, ty } => {
                let (v, src_ty) = self.read_lvalue(val)?;
                self.cast_value(v, &src_ty, ty)
            }
            RValue::UniOp { op, val } => {
                let (r, ty) = self.get_value_and_type(val)?;
                self.eval_uniop(*op, &r, &ty)
            }
            RValue::BinOp { lhs, op, rhs } => {
                let (lv, lty) = self.param_to_value(lhs)?;
                let (rv_, _) = self.param_to_value(rhs)?;
                self.eval_binop(*op, &lv, &rv_, &lty, dst_ty)
            }
            RValue::Tuple(params) | RValue::Struct { fields: params, .. } => {
                let size = dst_ty
                    .size(self.tree)
                    .ok_or_else(|| EvalError::TypeError("unsized composite target".into()))?;
                let mut out = Value::new_direct(size);
                for (i, p) in params.iter().enumerate() {
                    let (ofs, _) = dst_ty.get_field(i, self.tree)?;
                    let (v, _) = self.param_to_value(p)?;
                    out.write_value(ofs, &v)?;
                }
                Ok(out)
            }
            RValue::Variant { index, val, .. } => {
                let size = dst_ty
                    .size(self.tree)
                    .ok_or_else(|| EvalError::TypeError("unsized enum target".into()))?;
                let mut out = Value::new_direct(size);
                let (v, _) = self.param_to_value(val)?;
                if v.size() > 0 {
                    let (ofs, _) = dst_ty.get_field(*index, self.tree)?;
                    out.write_value(ofs, &v)?;
                }
                // Stamp the variant's tag bytes.
                let id = dst_ty
                    .composite
                    .ok_or_else(|| EvalError::TypeError("VARIANT into non-composite".into()))?;
                let dt = self.tree.data_type(id);
                if let Some(variant) = dt.variants.get(*index) {
                    if !variant.tag_data.is_empty() {
                        let (mut ofs, mut fty) = dt.fields[variant.base_field].clone();
                        for &p in &variant.field_path {
                            let (o2, t2) = fty.get_field(p, self.tree)?;
                            ofs += o2;
                            fty = t2;
                        }
                        out.write_bytes(ofs, &variant.tag_data)?;
                    }
                }
                Ok(out)
            }
            RValue::Array(params) => {
                let elem = dst_ty.get_inner();
                let esz = elem
                    .size(self.tree)
                    .ok_or_else(|| EvalError::TypeError("unsized array element".into()))?;
                let mut out = Value::new_direct(esz * params.len());
                for (i, p) in params.iter().enumerate() {
                    let (v, _) = self.param_to_value(p)?;
                    out.write_value(i * esz, &v)?;
                }
                Ok(out)
            }
            RValue::SizedArray { val, count } => {
                let (v, _) = self.param_to_value(val)?;
                let esz = v.size();
                let mut out = Value::new_direct(esz * count);
                for i in 0..*count {
                    out.write_value(i * esz, &v)?;
                }
                Ok(out)
            }
            RValue::MakeDst { ptr, meta } => {
                let (p, _) = self.param_to_value(ptr)?;
                let (m, _) = self.param_to_value(meta)?;
                let mut out = Value::new_direct(POINTER_SIZE + m.size().max(POINTER_SIZE));
                out.write_value(0, &p)?;
                out.write_value(POINTER_SIZE, &m)?;
                Ok(out)
            }
            RValue::DstPtr(lv) => {
                let (r, _) = self.get_value_and_type(lv)?;
                r.read_value(0, POINTER_SIZE)
            }
            RValue::DstMeta(lv) => {
                let (r, _) = self.get_value_and_type(lv)?;
                r.read_value(POINTER_SIZE, POINTER_SIZE)
            }
        }
    }

    fn eval_uniop(&mut self, op: UniOp, r: &ValueRef, ty: &TypeRef) -> EResult<Value> {
        let size = ty
            .size(self.tree)
            .ok_or_else(|| EvalError::TypeError("uniop on unsized value".into()))?;
        match op {
            UniOp::Inv => {
                if ty.inner == RawType::Bool {
                    let mut b = [0u8; 1];
                    r.read_bytes(0, &mut b)?;
                    return Ok(Value::from_bytes(&[(b[0] == 0) as u8]));
                }
                let mut buf = vec![0u8; size];
                r.read_bytes(0, &mut buf)?;
                for b in &mut buf {
                    *b = !*b;
                }
                Ok(Value::from_bytes(&buf))
            }
            UniOp::Neg => match ty.inner {
                RawType::F32 => {
                    let mut b = [0u8; 4];
                    r.read_bytes(0, &mut b)?;
                    Ok(Value::from_bytes(&(-f32::from_le_bytes(b)).to_le_bytes()))
                }
                RawType::F64 => {
                    let mut b = [0u8; 8];
                    r.read_bytes(0, &mut b)?;
                    Ok(Value::from_bytes(&(-f64::from_le_bytes(b)).to_le_bytes()))
                }
                _ => {
                    let prim = PrimitiveValue::from_value(ty.inner, r)?;
                    let neg = (prim.as_i128().wrapping_neg() as u128).to_le_bytes();
                    Ok(Value::from_bytes(&neg[..size]))
                }
            },
        }
    }

    fn eval_binop(
        &mut self,
        op: BinOp,
        lhs: &Value,
        rhs: &Value,
        lty: &TypeRef,
        dst_ty: &TypeRef,
    ) -> EResult<Value> {
        // Comparisons yield a bool byte.
        if matches!(
            op,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        ) {
            let ord = self.compare_values(lhs, rhs, lty)?;
            let res = match op {
                BinOp::Eq => ord == std::cmp::Ordering::Equal,
                BinOp::Ne => ord != std::cmp::Ordering::Equal,
                BinOp::Lt => ord == std::cmp::Ordering::Less,
                BinOp::Le => ord != std::cmp::Ordering::Greater,
                BinOp::Gt => ord == std::cmp::Ordering::Greater,
                BinOp::Ge => ord != std::cmp::Ordering::Less,
                _ => unreachable!(),
            };
            return Ok(Value::from_bytes(&[res as u8]));
        }

        if lty.inner.is_float() && lty.wrappers.is_empty() {
            return self.eval_float_binop(op, lhs, rhs, lty.inner);
        }

        let lsize = lhs.size();
        let lref = value_as_ref(lhs);
        let rref = value_as_ref(rhs);
        let raw = effective_int_type(lty, lsize);
        let lp = PrimitiveValue::from_value(raw, &lref)?;

        match op {
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
                let mut lb = vec![0u8; lsize];
                let mut rb = vec![0u8; lsize];
                lhs.read_bytes(0, &mut lb)?;
                rhs.read_bytes(0, &mut rb)?;
                for (a, b) in lb.iter_mut().zip(&rb) {
                    *a = match op {
                        BinOp::BitAnd => *a & b,
                        BinOp::BitOr => *a | b,
                        _ => *a ^ b,
                    };
                }
                Ok(Value::from_bytes(&lb))
            }
            BinOp::Shl | BinOp::Shr => {
                let shift_ref = value_as_ref(rhs);
                let shift =
                    PrimitiveValue::from_value(effective_int_type_simple(rhs.size()), &shift_ref)?
                        .as_u128() as u32;
                let bits = lsize as u32 * 8;
                let shift = shift % bits.max(1);
                let out = if op == BinOp::Shl {
                    lp.as_u128() << shift
                } else if raw.is_signed() {
                    (lp.as_i128() >> shift) as u128
                } else {
                    lp.as_u128() >> shift
                };
                Ok(Value::from_bytes(&out.to_le_bytes()[..lsize]))
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let rp = PrimitiveValue::from_value(raw, &rref)?;
                let v = match op {
                    BinOp::Add => lp.add(&rp)?.0,
                    BinOp::Sub => lp.subtract(&rp)?.0,
                    BinOp::Mul => lp.multiply(&rp)?.0,
                    BinOp::Div => lp.divide(&rp)?,
                    BinOp::Mod => lp.modulo(&rp)?,
                    _ => unreachable!(),
                };
                Ok(Value::from_bytes(&v.to_le_bytes()))
            }
            BinOp::AddOv | BinOp::SubOv | BinOp::MulOv | BinOp::DivOv => {
                let rp = PrimitiveValue::from_value(raw, &rref)?;
                let (v, ovf) = match op {
                    BinOp::AddOv => lp.add(&rp)?,
                    BinOp::SubOv => lp.subtract(&rp)?,
                    BinOp::MulOv => lp.multiply(&rp)?,
                    BinOp::DivOv => (lp.divide(&rp)?, Overflow::None),
                    _ => unreachable!(),
                };
                // `(T, bool)` in the destination composite's layout.
                let size = dst_ty.size(self.tree).unwrap_or(lsize + 1);
                let mut out = Value::new_direct(size);
                let (v_ofs, _) = dst_ty.get_field(0, self.tree).unwrap_or((0, lty.clone()));
                let (f_ofs, _) = dst_ty
                    .get_field(1, self.tree)
                    .unwrap_or((lsize, TypeRef::from_raw(RawType::Bool)));
                out.write_bytes(v_ofs, &v.to_le_bytes())?;
                out.write_bytes(f_ofs, &[(ovf != Overflow::None) as u8])?;
                Ok(out)
            }
            _ => unreachable!(),
        }
    }

    fn eval_float_binop(
        &mut self,
        op: BinOp,
        lhs: &Value,
        rhs: &Value,
        raw: RawType,
    ) -> EResult<Value> {
        macro_rules! float_case {
            ($t:ty, $n:expr) => {{
                let mut lb = [0u8; $n];
                let mut rb = [0u8; $n];
                lhs.read_bytes(0, &mut lb)?;
                rhs.read_bytes(0, &mut rb)?;
                let l = <$t>::from_le_bytes(lb);
                let r = <$t>::from_le_bytes(rb);
                let v = match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                    BinOp::Mod => l % r,
                    _ => {
                        return Err(EvalError::TypeError(format!(
                            "float operation {:?} unsupported",
                            op
                        )))
                    }
                };
                Ok(Value::from_bytes(&v.to_le_bytes()))
            }};
        }
        match raw {
            RawType::F32 => float_case!(f32, 4),
            RawType::F64 => float_case!(f64, 8),
            _ => unreachable!(),
        }
    }

    fn compare_values(
        &mut self,
        lhs: &Value,
        rhs: &Value,
        ty: &TypeRef,
    ) -> EResult<std::cmp::Ordering> {
        use std::cmp::Ordering;
        if ty.wrappers.is_empty() && ty.inner.is_float() {
            let (l, r) = match ty.inner {
                RawType::F32 => {
                    let mut lb = [0u8; 4];
                    let mut rb = [0u8; 4];
                    lhs.read_bytes(0, &mut lb)?;
                    rhs.read_bytes(0, &mut rb)?;
                    (f32::from_le_bytes(lb) as f64, f32::from_le_bytes(rb) as f64)
                }
                _ => {
                    let mut lb = [0u8; 8];
                    let mut rb = [0u8; 8];
                    lhs.read_bytes(0, &mut lb)?;
                    rhs.read_bytes(0, &mut rb)?;
                    (f64::from_le_bytes(lb), f64::from_le_bytes(rb))
                }
            };
            return Ok(l.partial_cmp(&r).unwrap_or(Ordering::Greater));
        }
        let size = lhs.size();
        let raw = effective_int_type(ty, size);
        let lref = value_as_ref(lhs);
        let rref = value_as_ref(rhs);
        let lp = PrimitiveValue::from_value(raw, &lref)?;
        let rp = PrimitiveValue::from_value(raw, &rref)?;
        Ok(if raw.is_signed() {
            lp.as_i128().cmp(&rp.as_i128())
        } else {
            lp.as_u128().cmp(&rp.as_u128())
        })
    }

    fn cast_value(&mut self, v: Value, src_ty: &TypeRef, dst_ty: &TypeRef) -> EResult<Value> {
        let dst_size = dst_ty
            .size(self.tree)
            .ok_or_else(|| EvalError::TypeError("cast to unsized type".into()))?;

        // Pointer-ish casts keep bytes and relocations.
        if src_ty.is_pointer() || dst_ty.is_pointer() {
            return v.read_value(0, dst_size.min(v.size()));
        }

        let src_is_float = src_ty.wrappers.is_empty() && src_ty.inner.is_float();
        let dst_is_float = dst_ty.wrappers.is_empty() && dst_ty.inner.is_float();
        if src_is_float || dst_is_float {
            let src_f = if src_is_float {
                match src_ty.inner {
                    RawType::F32 => {
                        let mut b = [0u8; 4];
                        v.read_bytes(0, &mut b)?;
                        f32::from_le_bytes(b) as f64
                    }
                    _ => {
                        let mut b = [0u8; 8];
                        v.read_bytes(0, &mut b)?;
                        f64::from_le_bytes(b)
                    }
                }
            } else {
                let r = value_as_ref(&v);
                let p = PrimitiveValue::from_value(effective_int_type(src_ty, v.size()), &r)?;
                if src_ty.inner.is_signed() {
                    p.as_i128() as f64
                } else {
                    p.as_u128() as f64
                }
            };
            return Ok(if dst_is_float {
                match dst_ty.inner {
                    RawType::F32 => Value::from_bytes(&(src_f as f32).to_le_bytes()),
                    _ => Value::from_bytes(&src_f.to_le_bytes()),
                }
            } else {
                let i = src_f as i128;
                Value::from_bytes(&i.to_le_bytes()[..dst_size])
            });
        }

        // Integer-to-integer: sign- or zero-extend, then truncate.
        let r = value_as_ref(&v);
        let p = PrimitiveValue::from_value(effective_int_type(src_ty, v.size()), &r)?;
        let wide = if src_ty.inner.is_signed() {
            p.as_i128() as u128
        } else {
            p.as_u128()
        };
        Ok(Value::from_bytes(&wide.to_le_bytes()[..dst_size]))
    }
}

/// View a temporary `Value` as a `ValueRef` for primitive reads.
fn value_as_ref(v: &Value) -> ValueRef {
    let mut clone = v.clone();
    let alloc = clone.create_allocation();
    let size = alloc.size();
    ValueRef::new(alloc, 0, size)
}

/// The integer interpretation of a type, defaulting by size for
/// non-numeric scrutinees (bool, char, enums' tags).
fn effective_int_type(ty: &TypeRef, size: usize) -> RawType {
    if ty.wrappers.is_empty() {
        match ty.inner {
            RawType::Bool => RawType::U8,
            RawType::Char => RawType::U32,
            t if t.size().is_some() && !t.is_float() && t != RawType::Unit => t,
            _ => effective_int_type_simple(size),
        }
    } else {
        effective_int_type_simple(size)
    }
}

fn effective_int_type_simple(size: usize) -> RawType {
    match size {
        1 => RawType::U8,
        2 => RawType::U16,
        4 => RawType::U32,
        16 => RawType::U128,
        _ => RawType::U64,
    }
}
