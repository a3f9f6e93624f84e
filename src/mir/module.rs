//! Loader for textual MIR: parses `crate`/`fn`/`static`/`type` items into a
//! module tree shared by the whole interpreter run.

use std::collections::{HashMap, HashSet};
use std::path::{Path as FsPath, PathBuf};
use std::rc::Rc;

use super::lex::{LResult, MirLexer, TokenClass};
use super::value::{AllocHandle, RelocTarget, Value};
use super::{
    BasicBlock, BinOp, BorrowKind, CallTarget, Constant, DataType, DropFlagSrc, DropKind, FnKind,
    Function, FunctionBody, GenericPath, LValue, Param, Path, RValue, RawType, SimplePath,
    Statement, Terminator, TypeId, TypeRef, TypeWrapper, UniOp, VariantValue,
};

#[derive(Debug, Clone)]
pub struct StaticValue {
    pub ty: TypeRef,
    pub val: Value,
}

/// Container for loaded functions, statics, and data types. Populated at
/// load time; read-only during execution.
#[derive(Default)]
pub struct ModuleTree {
    loaded_files: HashSet<PathBuf>,
    functions: HashMap<Path, Rc<Function>>,
    statics: HashMap<Path, StaticValue>,
    types: Vec<DataType>,
    type_ids: HashMap<GenericPath, TypeId>,
}

impl ModuleTree {
    pub fn new() -> ModuleTree {
        ModuleTree::default()
    }

    /// Load a `.mir` file, following `crate "path";` imports transitively.
    /// Re-loading an already loaded file is a no-op.
    pub fn load_file(&mut self, path: &FsPath) -> LResult<()> {
        let canonical = path.to_path_buf();
        if !self.loaded_files.insert(canonical) {
            return Ok(());
        }
        let source = std::fs::read_to_string(path).map_err(|e| super::lex::LoadError {
            file: path.display().to_string(),
            line: 0,
            msg: format!("unable to open file: {}", e),
        })?;
        self.load_source(&path.display().to_string(), &source, path.parent())
    }

    /// Load from in-memory text. `base_dir` anchors relative `crate` paths.
    pub fn load_source(
        &mut self,
        name: &str,
        source: &str,
        base_dir: Option<&FsPath>,
    ) -> LResult<()> {
        let mut parser = Parser {
            tree: self,
            lex: MirLexer::new(name, source)?,
            base_dir: base_dir.map(|p| p.to_path_buf()),
        };
        while parser.parse_one()? {}
        Ok(())
    }

    pub fn get_function(&self, path: &Path) -> Option<Rc<Function>> {
        self.functions.get(path).cloned()
    }

    pub fn get_static(&self, path: &Path) -> Option<&StaticValue> {
        self.statics.get(path)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&Path, &Rc<Function>)> {
        self.functions.iter()
    }

    pub fn data_type(&self, id: TypeId) -> &DataType {
        &self.types[id.0]
    }

    /// Intern a composite path, creating an unpopulated placeholder on
    /// first reference.
    pub fn intern_type(&mut self, path: GenericPath) -> TypeId {
        if let Some(&id) = self.type_ids.get(&path) {
            return id;
        }
        let id = TypeId(self.types.len());
        self.types.push(DataType::default());
        self.type_ids.insert(path, id);
        id
    }

    pub fn lookup_type(&self, path: &GenericPath) -> Option<TypeId> {
        self.type_ids.get(path).copied()
    }

    /// The designated program entry: a function whose path ends in `start`,
    /// else one ending in `main`.
    pub fn find_entry(&self) -> Option<&Path> {
        for want in ["start", "main"] {
            if let Some(path) = self
                .functions
                .keys()
                .find(|p| p.item_name() == Some(want))
            {
                return Some(path);
            }
        }
        None
    }
}

struct Parser<'t> {
    tree: &'t mut ModuleTree,
    lex: MirLexer,
    base_dir: Option<PathBuf>,
}

/// Slot names in scope while parsing one function body.
struct Names {
    args: Vec<String>,
    vars: Vec<String>,
}

impl<'t> Parser<'t> {
    /// Parse a single top-level item. Returns false at EOF.
    fn parse_one(&mut self) -> LResult<bool> {
        if self.lex.next().class == TokenClass::Eof {
            return Ok(false);
        }

        if self.lex.consume_if_ident("crate")? {
            let rel = self.lex.expect_string()?;
            self.lex.check_consume_sym(";")?;
            let path = match &self.base_dir {
                Some(dir) if FsPath::new(&rel).is_relative() => dir.join(&rel),
                _ => PathBuf::from(&rel),
            };
            self.tree
                .load_file(&path)
                .map_err(|e| self.lex.err(format!("while loading `{}`: {}", rel, e)))?;
        } else if self.lex.consume_if_ident("fn")? {
            let path = self.parse_path()?;
            self.lex.check_consume_sym("(")?;
            let mut args = Vec::new();
            let mut arg_names = Vec::new();
            while !self.lex.next().is_sym(")") {
                // Argument names are optional: `a: i32` or plain `i32`.
                if self.lex.next().class == TokenClass::Ident {
                    let name = self.lex.expect_ident()?;
                    if self.lex.consume_if_sym(":")? {
                        arg_names.push(name);
                        args.push(self.parse_type()?);
                    } else {
                        arg_names.push(String::new());
                        args.push(self.core_type_ref(&name)?);
                    }
                } else {
                    arg_names.push(String::new());
                    args.push(self.parse_type()?);
                }
                if !self.lex.consume_if_sym(",")? {
                    break;
                }
            }
            self.lex.check_consume_sym(")")?;
            let ret = if self.lex.consume_if_sym(":")? {
                self.parse_type()?
            } else {
                TypeRef::unit()
            };
            let kind = if self.lex.consume_if_sym("=")? {
                // Declaration: `= "link_name":"abi";`
                let link_name = self.lex.expect_string()?;
                self.lex.check_consume_sym(":")?;
                let abi = self.lex.expect_string()?;
                self.lex.check_consume_sym(";")?;
                FnKind::External { link_name, abi }
            } else {
                FnKind::Local(self.parse_body(arg_names)?)
            };
            self.tree.functions.insert(
                path,
                Rc::new(Function {
                    args,
                    ret,
                    kind,
                }),
            );
        } else if self.lex.consume_if_ident("static")? {
            let path = self.parse_path()?;
            self.lex.check_consume_sym(":")?;
            let ty = self.parse_type()?;
            self.lex.check_consume_sym("=")?;
            let bytes: Vec<u8> = self
                .lex
                .expect_string()?
                .chars()
                .map(|c| c as u8)
                .collect();
            let size = ty.size(self.tree).unwrap_or(bytes.len()).max(bytes.len());
            let alloc = AllocHandle::alloc(size);
            alloc
                .borrow_mut()
                .write_bytes(0, &bytes)
                .map_err(|e| self.lex.err(format!("static initialiser: {}", e)))?;
            alloc.borrow_mut().mark_bytes_valid(0, size);
            if self.lex.consume_if_sym("{")? {
                // Relocations: `{ @<ofs> = <path-or-string>; ... }`
                while !self.lex.next().is_sym("}") {
                    self.lex.check_consume_sym("@")?;
                    let ofs = self.lex.expect_integer()? as usize;
                    self.lex.check_consume_sym("=")?;
                    let target = if self.lex.next().class == TokenClass::String {
                        let s = self.lex.expect_string()?;
                        let target_alloc = AllocHandle::alloc(s.len());
                        target_alloc
                            .borrow_mut()
                            .write_bytes(0, s.as_bytes())
                            .expect("fits");
                        RelocTarget::Alloc(target_alloc)
                    } else {
                        RelocTarget::Function(Rc::new(self.parse_path()?))
                    };
                    alloc.borrow_mut().set_relocation(ofs, target);
                    self.lex.check_consume_sym(";")?;
                }
                self.lex.check_consume_sym("}")?;
            }
            self.lex.check_consume_sym(";")?;
            self.tree.statics.insert(
                path,
                StaticValue {
                    ty,
                    val: Value::from_alloc(alloc),
                },
            );
        } else if self.lex.consume_if_ident("type")? {
            let path = if self.lex.consume_if_sym("(")? {
                self.parse_tuple()?
            } else {
                self.parse_genericpath()?
            };

            let mut dt = DataType::default();
            self.lex.check_consume_sym("{")?;
            self.lex.check_consume_ident("SIZE")?;
            dt.size = self.lex.expect_integer()? as usize;
            self.lex.check_consume_sym(",")?;
            self.lex.check_consume_ident("ALIGN")?;
            dt.alignment = self.lex.expect_integer()? as usize;
            if dt.alignment == 0 {
                return Err(self.lex.err(format!("alignment of zero is invalid for {}", path)));
            }
            self.lex.check_consume_sym(";")?;

            // Fields: `<ofs> = <ty>;`
            while self.lex.next().class == TokenClass::Integer {
                let ofs = self.lex.expect_integer()? as usize;
                self.lex.check_consume_sym("=")?;
                let ty = self.parse_type()?;
                self.lex.check_consume_sym(";")?;
                dt.fields.push((ofs, ty));
            }
            // Variants: `[base, path...] = "tag bytes";`
            while self.lex.next().is_sym("[") {
                self.lex.consume()?;
                let base_field = self.lex.expect_integer()? as usize;
                let mut field_path = Vec::new();
                while self.lex.consume_if_sym(",")? {
                    field_path.push(self.lex.expect_integer()? as usize);
                }
                self.lex.check_consume_sym("]")?;
                self.lex.check_consume_sym("=")?;
                let tag_data = self
                    .lex
                    .expect_string()?
                    .chars()
                    .map(|c| c as u8)
                    .collect();
                self.lex.check_consume_sym(";")?;
                dt.variants.push(VariantValue {
                    base_field,
                    field_path,
                    tag_data,
                });
            }
            self.lex.check_consume_sym("}")?;

            let id = self.tree.intern_type(path.clone());
            let slot = &mut self.tree.types[id.0];
            if slot.is_populated() {
                // Cross-crate redundancy is tolerated, not an error.
            } else {
                *slot = dt;
            }
        } else {
            return Err(self
                .lex
                .err(format!("unexpected token at root - `{}`", self.lex.next())));
        }
        Ok(true)
    }

    fn parse_body(&mut self, arg_names: Vec<String>) -> LResult<FunctionBody> {
        let mut body = FunctionBody::default();
        let mut names = Names {
            args: arg_names,
            vars: Vec::new(),
        };
        let mut flag_names: Vec<String> = Vec::new();

        self.lex.check_consume_sym("{")?;

        // Locals and drop flags.
        while self.lex.next().is_ident("let") {
            self.lex.consume()?;
            let name = self.lex.expect_ident()?;
            if self.lex.consume_if_sym("=")? {
                let v = self.lex.expect_integer()?;
                body.drop_flags.push(v != 0);
                flag_names.push(name);
            } else if self.lex.consume_if_sym(":")? {
                names.vars.push(name);
                body.locals.push(self.parse_type()?);
            } else {
                return Err(self.lex.err("expected `:` or `=` after local name"));
            }
            self.lex.check_consume_sym(";")?;
        }

        // Numbered basic blocks.
        while self.lex.next().class == TokenClass::Integer {
            let idx = self.lex.expect_integer()? as usize;
            if idx != body.blocks.len() {
                return Err(self.lex.err(format!(
                    "basic block {} out of order (expected {})",
                    idx,
                    body.blocks.len()
                )));
            }
            self.lex.check_consume_sym(":")?;
            self.lex.check_consume_sym("{")?;

            let mut stmts = Vec::new();
            let term = loop {
                if self.lex.consume_if_ident("ASSIGN")? {
                    let dst = self.parse_lvalue(&names)?;
                    self.lex.check_consume_sym("=")?;
                    let src = self.parse_rvalue(&names)?;
                    stmts.push(Statement::Assign { dst, src });
                } else if self.lex.consume_if_ident("SETFLAG")? {
                    let name = self.lex.expect_ident()?;
                    let idx = flag_index(&flag_names, &name)
                        .ok_or_else(|| self.lex.err(format!("unknown drop flag `{}`", name)))?;
                    self.lex.check_consume_sym("=")?;
                    let src = if self.lex.next().class == TokenClass::Integer {
                        DropFlagSrc::Const(self.lex.expect_integer()? != 0)
                    } else {
                        let inv = self.lex.consume_if_sym("!")?;
                        let other = self.lex.expect_ident()?;
                        let other_idx = flag_index(&flag_names, &other).ok_or_else(|| {
                            self.lex.err(format!("unknown drop flag `{}`", other))
                        })?;
                        if inv {
                            DropFlagSrc::InvFlag(other_idx)
                        } else {
                            DropFlagSrc::Flag(other_idx)
                        }
                    };
                    stmts.push(Statement::SetDropFlag { idx, src });
                } else if self.lex.consume_if_ident("DROP")? {
                    let slot = self.parse_lvalue(&names)?;
                    let kind = if self.lex.consume_if_ident("SHALLOW")? {
                        DropKind::Shallow
                    } else {
                        DropKind::Deep
                    };
                    let flag = if self.lex.consume_if_ident("IF")? {
                        let name = self.lex.expect_ident()?;
                        Some(flag_index(&flag_names, &name).ok_or_else(|| {
                            self.lex.err(format!("unknown drop flag `{}`", name))
                        })?)
                    } else {
                        None
                    };
                    stmts.push(Statement::Drop { kind, slot, flag });
                } else {
                    break self.parse_terminator(&names)?;
                }
                self.lex.check_consume_sym(";")?;
            };

            self.lex.check_consume_sym("}")?;
            body.blocks.push(BasicBlock {
                statements: stmts,
                terminator: term,
            });
        }

        self.lex.check_consume_sym("}")?;
        Ok(body)
    }

    fn parse_terminator(&mut self, names: &Names) -> LResult<Terminator> {
        if self.lex.consume_if_ident("GOTO")? {
            Ok(Terminator::Goto(self.lex.expect_integer()? as usize))
        } else if self.lex.consume_if_ident("PANIC")? {
            Ok(Terminator::Panic {
                cleanup: self.lex.expect_integer()? as usize,
            })
        } else if self.lex.consume_if_ident("RETURN")? {
            Ok(Terminator::Return)
        } else if self.lex.consume_if_ident("DIVERGE")? {
            Ok(Terminator::Diverge)
        } else if self.lex.consume_if_ident("IF")? {
            let cond = self.parse_lvalue(names)?;
            self.lex.check_consume_ident("goto")?;
            let bb_true = self.lex.expect_integer()? as usize;
            self.lex.check_consume_ident("else")?;
            let bb_false = self.lex.expect_integer()? as usize;
            Ok(Terminator::If {
                cond,
                bb_true,
                bb_false,
            })
        } else if self.lex.consume_if_ident("SWITCH")? {
            let val = self.parse_lvalue(names)?;
            self.lex.check_consume_sym("{")?;
            let mut targets = Vec::new();
            while !self.lex.next().is_sym("}") {
                targets.push(self.lex.expect_integer()? as usize);
                if !self.lex.consume_if_sym(",")? {
                    break;
                }
            }
            self.lex.check_consume_sym("}")?;
            Ok(Terminator::Switch { val, targets })
        } else if self.lex.consume_if_ident("SWITCHVAL")? {
            let val = self.parse_lvalue(names)?;
            self.lex.check_consume_sym("{")?;
            let mut values = Vec::new();
            let mut targets = Vec::new();
            let mut default = None;
            while !self.lex.next().is_sym("}") {
                if self.lex.consume_if_sym("_")? {
                    self.lex.check_consume_ident("goto")?;
                    default = Some(self.lex.expect_integer()? as usize);
                } else {
                    values.push(self.lex.expect_integer()? as u64);
                    self.lex.check_consume_ident("goto")?;
                    targets.push(self.lex.expect_integer()? as usize);
                }
                if !self.lex.consume_if_sym(",")? {
                    break;
                }
            }
            self.lex.check_consume_sym("}")?;
            let default =
                default.ok_or_else(|| self.lex.err("SWITCHVAL requires a `_ goto N` default"))?;
            Ok(Terminator::SwitchValue {
                val,
                values,
                targets,
                default,
            })
        } else if self.lex.consume_if_ident("CALL")? {
            let dst = self.parse_lvalue(names)?;
            self.lex.check_consume_sym("=")?;
            let target = if self.lex.consume_if_sym("(")? {
                let lv = self.parse_lvalue(names)?;
                self.lex.check_consume_sym(")")?;
                CallTarget::Value(lv)
            } else if self.lex.next().class == TokenClass::String {
                let name = self.lex.expect_string()?;
                let params = self.parse_pathparams()?;
                CallTarget::Intrinsic { name, params }
            } else {
                CallTarget::Path(self.parse_path()?)
            };
            self.lex.check_consume_sym("(")?;
            let mut args = Vec::new();
            while !self.lex.next().is_sym(")") {
                args.push(self.parse_param(names)?);
                if !self.lex.consume_if_sym(",")? {
                    break;
                }
            }
            self.lex.check_consume_sym(")")?;
            self.lex.check_consume_ident("goto")?;
            let dst_block = self.lex.expect_integer()? as usize;
            self.lex.check_consume_ident("else")?;
            let panic_block = self.lex.expect_integer()? as usize;
            Ok(Terminator::Call {
                dst_block,
                panic_block,
                dst,
                target,
                args,
            })
        } else {
            Err(self
                .lex
                .err(format!("unexpected token at terminator - `{}`", self.lex.next())))
        }
    }

    fn parse_lvalue(&mut self, names: &Names) -> LResult<LValue> {
        // Leading derefs wrap the final lvalue.
        let mut deref = 0;
        while self.lex.consume_if_sym("*")? {
            deref += 1;
        }

        let mut lv = if self.lex.consume_if_sym("(")? {
            let inner = self.parse_lvalue(names)?;
            self.lex.check_consume_sym(")")?;
            inner
        } else if self.lex.next().class == TokenClass::Ident {
            let name = self.lex.expect_ident()?;
            if name == "RETURN" {
                LValue::Return
            } else if let Some(idx) = names.args.iter().position(|n| n == &name) {
                LValue::Argument(idx)
            } else if let Some(idx) = names.vars.iter().position(|n| n == &name) {
                LValue::Local(idx)
            } else if let Some(idx) = name
                .strip_prefix("arg")
                .and_then(|rest| rest.parse::<usize>().ok())
            {
                LValue::Argument(idx)
            } else {
                return Err(self
                    .lex
                    .err(format!("cannot find variable named `{}`", name)));
            }
        } else if self.lex.next().is_sym("::") || self.lex.next().is_sym("<") {
            LValue::Static(self.parse_path()?)
        } else {
            return Err(self
                .lex
                .err(format!("unexpected token in lvalue - `{}`", self.lex.next())));
        };

        loop {
            if self.lex.consume_if_sym("@")? {
                let variant = self.lex.expect_integer()? as usize;
                lv = LValue::Downcast {
                    base: Box::new(lv),
                    variant,
                };
            } else if self.lex.consume_if_sym(".")? {
                let idx = self.lex.expect_integer()? as usize;
                lv = LValue::Field {
                    base: Box::new(lv),
                    idx,
                };
            } else if self.lex.next().is_sym("[") {
                self.lex.consume()?;
                let idx = self.parse_lvalue(names)?;
                self.lex.check_consume_sym("]")?;
                lv = LValue::Index {
                    base: Box::new(lv),
                    idx: Box::new(idx),
                };
            } else {
                break;
            }
        }
        for _ in 0..deref {
            lv = LValue::Deref(Box::new(lv));
        }
        Ok(lv)
    }

    fn parse_const(&mut self) -> LResult<Constant> {
        if self.lex.next().class == TokenClass::Integer {
            let v = self.lex.expect_integer()?;
            let ty = self.parse_core_type()?;
            Ok(Constant::Uint { v: v as u64, ty })
        } else if self.lex.next().is_sym("+") || self.lex.next().is_sym("-") {
            let neg = self.lex.consume()?.is_sym("-");
            let v = self.lex.expect_integer()? as i64;
            let ty = self.parse_core_type()?;
            Ok(Constant::Int {
                v: if neg { -v } else { v },
                ty,
            })
        } else if self.lex.consume_if_ident("true")? {
            Ok(Constant::Bool(true))
        } else if self.lex.consume_if_ident("false")? {
            Ok(Constant::Bool(false))
        } else if self.lex.next().class == TokenClass::String {
            Ok(Constant::Str(self.lex.expect_string()?))
        } else if self.lex.consume_if_sym("&")? {
            Ok(Constant::ItemAddr(Box::new(self.parse_path()?)))
        } else {
            Err(self
                .lex
                .err(format!("unexpected token in constant - `{}`", self.lex.next())))
        }
    }

    fn param_starts_const(&self) -> bool {
        let t = self.lex.next();
        t.class == TokenClass::Integer
            || t.class == TokenClass::String
            || t.is_sym("+")
            || t.is_sym("-")
            || t.is_sym("&")
            || t.is_ident("true")
            || t.is_ident("false")
    }

    fn parse_param(&mut self, names: &Names) -> LResult<Param> {
        if self.param_starts_const() {
            Ok(Param::Const(self.parse_const()?))
        } else {
            Ok(Param::LValue(self.parse_lvalue(names)?))
        }
    }

    fn parse_rvalue(&mut self, names: &Names) -> LResult<RValue> {
        let t = self.lex.next();
        if t.class == TokenClass::Integer
            || t.class == TokenClass::String
            || t.is_sym("+")
            || t.is_sym("-")
            || t.is_ident("true")
            || t.is_ident("false")
        {
            return Ok(RValue::Const(self.parse_const()?));
        }
        if self.lex.consume_if_sym("=")? {
            return Ok(RValue::Use(self.parse_lvalue(names)?));
        }
        if self.lex.consume_if_sym("&")? {
            let kind = if self.lex.consume_if_ident("move")? {
                BorrowKind::Move
            } else if self.lex.consume_if_ident("mut")? {
                BorrowKind::Unique
            } else {
                BorrowKind::Shared
            };
            let val = self.parse_lvalue(names)?;
            return Ok(RValue::Borrow { kind, val });
        }
        if self.lex.consume_if_sym("(")? {
            let mut vals = Vec::new();
            while !self.lex.next().is_sym(")") {
                vals.push(self.parse_param(names)?);
                if !self.lex.consume_if_sym(",")? {
                    break;
                }
            }
            self.lex.check_consume_sym(")")?;
            return Ok(RValue::Tuple(vals));
        }
        if self.lex.consume_if_sym("[")? {
            if self.lex.consume_if_sym("]")? {
                return Ok(RValue::Array(Vec::new()));
            }
            let first = self.parse_param(names)?;
            if self.lex.consume_if_sym(";")? {
                let count = self.lex.expect_integer()? as usize;
                self.lex.check_consume_sym("]")?;
                return Ok(RValue::SizedArray { val: first, count });
            }
            let mut vals = vec![first];
            while self.lex.consume_if_sym(",")? {
                if self.lex.next().is_sym("]") {
                    break;
                }
                vals.push(self.parse_param(names)?);
            }
            self.lex.check_consume_sym("]")?;
            return Ok(RValue::Array(vals));
        }
        if self.lex.consume_if_sym("{")? {
            let mut vals = Vec::new();
            while !self.lex.next().is_sym("}") {
                vals.push(self.parse_param(names)?);
                if !self.lex.consume_if_sym(",")? {
                    break;
                }
            }
            self.lex.check_consume_sym("}")?;
            self.lex.check_consume_sym(":")?;
            let path = self.parse_genericpath()?;
            return Ok(RValue::Struct { path, fields: vals });
        }
        if self.lex.consume_if_ident("VARIANT")? {
            let path = self.parse_genericpath()?;
            let index = self.lex.expect_integer()? as usize;
            let val = self.parse_param(names)?;
            return Ok(RValue::Variant { path, index, val });
        }
        if self.lex.consume_if_ident("CAST")? {
            let val = self.parse_lvalue(names)?;
            self.lex.check_consume_ident("as")?;
            let ty = self.parse_type()?;
            return Ok(RValue::Cast { val, ty });
        }
        if self.lex.consume_if_ident("UNIOP")? {
            let op = if self.lex.consume_if_sym("!")? {
                UniOp::Inv
            } else if self.lex.consume_if_sym("-")? {
                UniOp::Neg
            } else {
                return Err(self
                    .lex
                    .err(format!("unexpected token in uniop - `{}`", self.lex.next())));
            };
            let val = self.parse_lvalue(names)?;
            return Ok(RValue::UniOp { op, val });
        }
        if self.lex.consume_if_ident("BINOP")? {
            let lhs = self.parse_param(names)?;
            let op = self.parse_binop()?;
            let rhs = self.parse_param(names)?;
            return Ok(RValue::BinOp { lhs, op, rhs });
        }
        if self.lex.consume_if_ident("MAKEDST")? {
            let ptr = self.parse_param(names)?;
            self.lex.check_consume_sym(",")?;
            let meta = self.parse_param(names)?;
            return Ok(RValue::MakeDst { ptr, meta });
        }
        if self.lex.consume_if_ident("DSTPTR")? {
            return Ok(RValue::DstPtr(self.parse_lvalue(names)?));
        }
        if self.lex.consume_if_ident("DSTMETA")? {
            return Ok(RValue::DstMeta(self.parse_lvalue(names)?));
        }
        Err(self
            .lex
            .err(format!("unexpected token in rvalue - `{}`", self.lex.next())))
    }

    fn parse_binop(&mut self) -> LResult<BinOp> {
        let t = self.lex.consume()?;
        if t.class != TokenClass::Symbol {
            return Err(self.lex.err(format!("expected operator, got `{}`", t)));
        }
        Ok(match t.text.as_str() {
            "+" => {
                if self.lex.consume_if_sym("^")? {
                    BinOp::AddOv
                } else {
                    BinOp::Add
                }
            }
            "-" => {
                if self.lex.consume_if_sym("^")? {
                    BinOp::SubOv
                } else {
                    BinOp::Sub
                }
            }
            "*" => {
                if self.lex.consume_if_sym("^")? {
                    BinOp::MulOv
                } else {
                    BinOp::Mul
                }
            }
            "/" => {
                if self.lex.consume_if_sym("^")? {
                    BinOp::DivOv
                } else {
                    BinOp::Div
                }
            }
            "%" => BinOp::Mod,
            "|" => BinOp::BitOr,
            "&" => BinOp::BitAnd,
            "^" => BinOp::BitXor,
            "<" => {
                if self.lex.consume_if_sym("<")? {
                    BinOp::Shl
                } else if self.lex.consume_if_sym("=")? {
                    BinOp::Le
                } else {
                    BinOp::Lt
                }
            }
            ">" => {
                if self.lex.consume_if_sym(">")? {
                    BinOp::Shr
                } else if self.lex.consume_if_sym("=")? {
                    BinOp::Ge
                } else {
                    BinOp::Gt
                }
            }
            "=" => {
                self.lex.check_consume_sym("=")?;
                BinOp::Eq
            }
            "!" => {
                self.lex.check_consume_sym("=")?;
                BinOp::Ne
            }
            other => {
                return Err(self.lex.err(format!("unexpected operator `{}` in BINOP", other)))
            }
        })
    }

    // ---- paths and types -------------------------------------------------

    fn parse_path(&mut self) -> LResult<Path> {
        if self.lex.consume_if_sym("<")? {
            let ty = self.parse_type()?;
            let trait_path = if self.lex.consume_if_ident("as")? {
                Some(self.parse_genericpath()?)
            } else {
                None
            };
            self.lex.check_consume_sym(">")?;
            self.lex.check_consume_sym("::")?;
            let name = self.lex.expect_ident()?;
            let params = self.parse_pathparams()?;
            Ok(Path::Ufcs {
                ty,
                trait_path,
                name,
                params,
            })
        } else {
            Ok(Path::Simple(self.parse_genericpath()?))
        }
    }

    fn parse_genericpath(&mut self) -> LResult<GenericPath> {
        let path = self.parse_simplepath()?;
        let params = self.parse_pathparams()?;
        Ok(GenericPath { path, params })
    }

    fn parse_simplepath(&mut self) -> LResult<SimplePath> {
        self.lex.check_consume_sym("::")?;
        let crate_name = self.lex.expect_string()?;
        self.lex.check_consume_sym("::")?;
        let mut components = vec![self.lex.expect_ident()?];
        while self.lex.next().is_sym("::") {
            self.lex.consume()?;
            components.push(self.lex.expect_ident()?);
        }
        Ok(SimplePath {
            crate_name,
            components,
        })
    }

    fn parse_pathparams(&mut self) -> LResult<Vec<TypeRef>> {
        let mut params = Vec::new();
        if self.lex.consume_if_sym("<")? {
            while !self.lex.next().is_sym(">") {
                params.push(self.parse_type()?);
                if !self.lex.consume_if_sym(",")? {
                    break;
                }
            }
            self.lex.check_consume_sym(">")?;
        }
        Ok(params)
    }

    /// Tuples are interned as composites under an empty simple path.
    fn parse_tuple(&mut self) -> LResult<GenericPath> {
        let mut gp = GenericPath::default();
        while !self.lex.next().is_sym(")") {
            gp.params.push(self.parse_type()?);
            if !self.lex.consume_if_sym(",")? {
                break;
            }
        }
        self.lex.check_consume_sym(")")?;
        Ok(gp)
    }

    fn parse_core_type(&mut self) -> LResult<RawType> {
        let name = self.lex.expect_ident()?;
        self.core_type_raw(&name)
    }

    fn core_type_raw(&self, name: &str) -> LResult<RawType> {
        Ok(match name {
            "u8" => RawType::U8,
            "u16" => RawType::U16,
            "u32" => RawType::U32,
            "u64" => RawType::U64,
            "u128" => RawType::U128,
            "usize" => RawType::USize,
            "i8" => RawType::I8,
            "i16" => RawType::I16,
            "i32" => RawType::I32,
            "i64" => RawType::I64,
            "i128" => RawType::I128,
            "isize" => RawType::ISize,
            "f32" => RawType::F32,
            "f64" => RawType::F64,
            "bool" => RawType::Bool,
            "char" => RawType::Char,
            "str" => RawType::Str,
            other => return Err(self.lex.err(format!("unknown core type `{}`", other))),
        })
    }

    fn core_type_ref(&self, name: &str) -> LResult<TypeRef> {
        Ok(TypeRef::from_raw(self.core_type_raw(name)?))
    }

    fn parse_type(&mut self) -> LResult<TypeRef> {
        if self.lex.consume_if_sym("(")? {
            if self.lex.consume_if_sym(")")? {
                return Ok(TypeRef::unit());
            }
            let gp = self.parse_tuple()?;
            let id = self.tree.intern_type(gp);
            Ok(TypeRef::composite(id))
        } else if self.lex.consume_if_sym("[")? {
            let inner = self.parse_type()?;
            let rv = if self.lex.consume_if_sym(";")? {
                let size = self.lex.expect_integer()? as usize;
                inner.wrapped(TypeWrapper::Array(size))
            } else {
                inner.wrapped(TypeWrapper::Slice)
            };
            self.lex.check_consume_sym("]")?;
            Ok(rv)
        } else if self.lex.consume_if_sym("!")? {
            Ok(TypeRef::diverge())
        } else if self.lex.consume_if_sym("&")? {
            let bt = if self.lex.consume_if_ident("move")? {
                BorrowKind::Move
            } else if self.lex.consume_if_ident("mut")? {
                BorrowKind::Unique
            } else {
                BorrowKind::Shared
            };
            Ok(self.parse_type()?.wrapped(TypeWrapper::Borrow(bt)))
        } else if self.lex.consume_if_sym("*")? {
            let bt = if self.lex.consume_if_ident("move")? {
                BorrowKind::Move
            } else if self.lex.consume_if_ident("mut")? {
                BorrowKind::Unique
            } else if self.lex.consume_if_ident("const")? {
                BorrowKind::Shared
            } else {
                return Err(self.lex.err("expected `const`, `mut`, or `move` after `*`"));
            };
            Ok(self.parse_type()?.wrapped(TypeWrapper::Pointer(bt)))
        } else if self.lex.next().is_sym("::") {
            let path = self.parse_genericpath()?;
            let id = self.tree.intern_type(path);
            Ok(TypeRef::composite(id))
        } else if self.lex.next().is_ident("extern") || self.lex.next().is_ident("fn") {
            if self.lex.consume_if_ident("extern")? {
                let _abi = self.lex.expect_string()?;
            }
            self.lex.check_consume_ident("fn")?;
            self.lex.check_consume_sym("(")?;
            while !self.lex.next().is_sym(")") {
                self.parse_type()?;
                if !self.lex.consume_if_sym(",")? {
                    break;
                }
            }
            self.lex.check_consume_sym(")")?;
            self.lex.check_consume_sym("-")?;
            self.lex.check_consume_sym(">")?;
            let _ret = self.parse_type()?;
            Ok(TypeRef::from_raw(RawType::Function))
        } else if self.lex.consume_if_ident("dyn")? {
            let parens = self.lex.consume_if_sym("(")?;
            if !self.lex.next().is_sym("+") && !self.lex.next().is_sym(")") {
                self.parse_genericpath()?;
            }
            while self.lex.consume_if_sym("+")? {
                self.parse_genericpath()?;
            }
            if parens {
                self.lex.check_consume_sym(")")?;
            }
            Ok(TypeRef::trait_object())
        } else if self.lex.next().class == TokenClass::Ident {
            self.parse_core_type().map(TypeRef::from_raw)
        } else {
            Err(self
                .lex
                .err(format!("unexpected token in type - `{}`", self.lex.next())))
        }
    }
}

fn flag_index(names: &[String], name: &str) -> Option<usize> {
    names.iter().position(|n| n == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(src: &str) -> ModuleTree {
        let mut tree = ModuleTree::new();
        tree.load_source("test.mir", src, None).expect("load ok");
        tree
    }

    #[test]
    fn loads_function_with_named_args() {
        let tree = load(
            r#"
            fn ::"test"::add(a: i32, b: i32): i32 {
                0: {
                    ASSIGN RETURN = BINOP arg0 + arg1;
                    RETURN
                }
            }
            "#,
        );
        let path = Path::simple("test", &["add"]);
        let f = tree.get_function(&path).expect("function registered");
        assert_eq!(f.args.len(), 2);
        assert_eq!(f.ret, TypeRef::from_raw(RawType::I32));
        match &f.kind {
            FnKind::Local(body) => {
                assert_eq!(body.blocks.len(), 1);
                assert!(matches!(
                    body.blocks[0].terminator,
                    Terminator::Return
                ));
            }
            _ => panic!("expected local body"),
        }
    }

    #[test]
    fn loads_type_with_placeholder_forward_ref() {
        let tree = load(
            r#"
            fn ::"t"::get(p: ::"t"::Pair): i32 {
                0: { RETURN }
            }
            type ::"t"::Pair { SIZE 8, ALIGN 4; 0 = i32; 4 = i32; }
            "#,
        );
        let gp = GenericPath {
            path: SimplePath::new("t", &["Pair"]),
            params: Vec::new(),
        };
        let id = tree.lookup_type(&gp).expect("type interned");
        let dt = tree.data_type(id);
        assert!(dt.is_populated());
        assert_eq!(dt.size, 8);
        assert_eq!(dt.fields.len(), 2);
    }

    #[test]
    fn duplicate_type_definitions_are_tolerated() {
        let tree = load(
            r#"
            type ::"t"::T { SIZE 4, ALIGN 4; 0 = i32; }
            type ::"t"::T { SIZE 4, ALIGN 4; 0 = i32; }
            "#,
        );
        let gp = GenericPath {
            path: SimplePath::new("t", &["T"]),
            params: Vec::new(),
        };
        assert!(tree.lookup_type(&gp).is_some());
    }

    #[test]
    fn locals_and_drop_flags_parse() {
        let tree = load(
            r#"
            fn ::"t"::f(): () {
                let x: i32;
                let df = 0;
                0: {
                    SETFLAG df = 1;
                    ASSIGN x = 5 i32;
                    DROP x IF df;
                    RETURN
                }
            }
            "#,
        );
        let f = tree
            .get_function(&Path::simple("t", &["f"]))
            .unwrap();
        match &f.kind {
            FnKind::Local(body) => {
                assert_eq!(body.locals.len(), 1);
                assert_eq!(body.drop_flags, vec![false]);
                assert_eq!(body.blocks[0].statements.len(), 3);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn lvalue_projections_parse() {
        let tree = load(
            r#"
            fn ::"t"::f(p: *const (i32, i32, )): i32 {
                0: {
                    ASSIGN RETURN = =(*p).1;
                    RETURN
                }
            }
            "#,
        );
        let f = tree
            .get_function(&Path::simple("t", &["f"]))
            .unwrap();
        match &f.kind {
            FnKind::Local(body) => match &body.blocks[0].statements[0] {
                Statement::Assign {
                    src: RValue::Use(LValue::Field { base, idx: 1 }),
                    ..
                } => {
                    assert!(matches!(**base, LValue::Deref(_)));
                }
                other => panic!("unexpected statement {:?}", other),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn extern_declaration_parses() {
        let tree = load(r#"fn ::"t"::memcmp(usize, usize, usize): i32 = "memcmp":"C";"#);
        let f = tree
            .get_function(&Path::simple("t", &["memcmp"]))
            .unwrap();
        assert!(matches!(
            &f.kind,
            FnKind::External { link_name, .. } if link_name == "memcmp"
        ));
    }

    #[test]
    fn static_with_value_loads() {
        let tree = load(r#"static ::"t"::S: [u8; 3] = "abc";"#);
        let s = tree.get_static(&Path::simple("t", &["S"])).unwrap();
        let mut buf = [0u8; 3];
        s.val.read_bytes(0, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn entry_lookup_prefers_start() {
        let tree = load(
            r#"
            fn ::"t"::main(): () { 0: { RETURN } }
            fn ::"t"::start(): () { 0: { RETURN } }
            "#,
        );
        assert_eq!(
            tree.find_entry().unwrap().item_name(),
            Some("start")
        );
    }

    #[test]
    fn unknown_root_keyword_fails() {
        let mut tree = ModuleTree::new();
        let err = tree.load_source("t.mir", "blah ;", None).unwrap_err();
        assert!(err.msg.contains("unexpected token at root"));
    }
}
