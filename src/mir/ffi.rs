//! External-function shims.
//!
//! The IR assumes a fixed catalog of externally-named functions exists:
//! the allocator, the unwind machinery, memory/string utilities, pthread
//! stubs, time/syscall defaults, and the Windows console surface. Anything
//! not in the catalog aborts with a structured TODO naming the link name.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use super::interp::{alloc_tls_key, CallCtx};
use super::value::{AllocHandle, FfiMarker, RelocTarget, Value};
use super::{EResult, EvalError};

const EXTERN_NAMES: &[&str] = &[
    "__errno_location",
    "__rust_alloc",
    "__rust_alloc_zeroed",
    "__rust_allocate",
    "__rust_dealloc",
    "__rust_deallocate",
    "__rust_maybe_catch_panic",
    "__rust_realloc",
    "__rust_reallocate",
    "__rust_start_panic",
    "_Unwind_DeleteException",
    "_Unwind_RaiseException",
    "AddVectoredExceptionHandler",
    "DeleteCriticalSection",
    "EnterCriticalSection",
    "GetConsoleMode",
    "GetModuleHandleW",
    "GetProcAddress",
    "GetStdHandle",
    "InitializeCriticalSection",
    "LeaveCriticalSection",
    "TlsAlloc",
    "TlsGetValue",
    "TlsSetValue",
    "TryEnterCriticalSection",
    "WriteConsoleW",
    "clock_gettime",
    "close",
    "dlsym",
    "fcntl",
    "getenv",
    "isatty",
    "memchr",
    "memcmp",
    "memrchr",
    "open64",
    "panic_impl",
    "prctl",
    "pthread_attr_destroy",
    "pthread_attr_getguardsize",
    "pthread_attr_getstack",
    "pthread_attr_init",
    "pthread_attr_setstacksize",
    "pthread_cond_broadcast",
    "pthread_cond_destroy",
    "pthread_cond_init",
    "pthread_cond_signal",
    "pthread_cond_wait",
    "pthread_condattr_destroy",
    "pthread_condattr_init",
    "pthread_condattr_setclock",
    "pthread_create",
    "pthread_detach",
    "pthread_getattr_np",
    "pthread_getspecific",
    "pthread_join",
    "pthread_key_create",
    "pthread_key_delete",
    "pthread_mutex_destroy",
    "pthread_mutex_init",
    "pthread_mutex_lock",
    "pthread_mutex_trylock",
    "pthread_mutex_unlock",
    "pthread_mutexattr_destroy",
    "pthread_mutexattr_init",
    "pthread_mutexattr_settype",
    "pthread_rwlock_rdlock",
    "pthread_rwlock_unlock",
    "pthread_rwlock_wrlock",
    "pthread_self",
    "pthread_setspecific",
    "read",
    "rust_begin_unwind",
    "setenv",
    "sigaction",
    "sigaltstack",
    "signal",
    "stat64",
    "strlen",
    "syscall",
    "sysconf",
    "write",
];

/// Lookup set over the catalog, built on first use.
static KNOWN_EXTERNS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| EXTERN_NAMES.iter().copied().collect());

pub fn is_known_extern(name: &str) -> bool {
    KNOWN_EXTERNS.contains(name)
}

fn ptr_target(v: &Value) -> EResult<(AllocHandle, usize)> {
    let ofs = v.read_usize(0)? as usize;
    match v.get_relocation(0) {
        Some(RelocTarget::Alloc(a)) => Ok((a, ofs)),
        Some(_) => Err(EvalError::TypeError("expected a data pointer".into())),
        None => Err(EvalError::MissingRelocation),
    }
}

fn int_arg(v: &Value) -> EResult<u64> {
    let size = v.size().min(8);
    let mut buf = [0u8; 8];
    v.read_bytes(0, &mut buf[..size])?;
    Ok(u64::from_le_bytes(buf))
}

fn null_ptr() -> Value {
    Value::new_usize(0)
}

/// Read a NUL-terminated byte string out of an allocation.
fn read_cstr(alloc: &AllocHandle, ofs: usize) -> EResult<Vec<u8>> {
    let a = alloc.borrow();
    let mut out = Vec::new();
    let mut i = ofs;
    loop {
        if i >= a.size() {
            return Err(EvalError::OutOfBounds {
                ofs: i,
                size: 1,
                limit: a.size(),
            });
        }
        let mut b = [0u8; 1];
        a.read_bytes(i, &mut b)?;
        if b[0] == 0 {
            return Ok(out);
        }
        out.push(b[0]);
        i += 1;
    }
}

pub fn call_extern(ctx: &mut CallCtx<'_, '_>, name: &str, args: Vec<Value>) -> EResult<Value> {
    match name {
        // ---- allocator ---------------------------------------------------
        "__rust_alloc" | "__rust_allocate" => {
            let size = int_arg(&args[0])? as usize;
            let alloc = AllocHandle::alloc(size);
            Ok(Value::new_pointer(0, RelocTarget::Alloc(alloc)))
        }
        "__rust_alloc_zeroed" => {
            let size = int_arg(&args[0])? as usize;
            let alloc = AllocHandle::alloc(size);
            alloc.borrow_mut().write_bytes(0, &vec![0; size])?;
            Ok(Value::new_pointer(0, RelocTarget::Alloc(alloc)))
        }
        "__rust_realloc" | "__rust_reallocate" => {
            // (ptr, old_size, align, new_size) - resized in place.
            let (alloc, ofs) = ptr_target(&args[0])?;
            let new_size = int_arg(&args[3])? as usize;
            alloc.borrow_mut().resize(ofs + new_size);
            Ok(args[0].clone())
        }
        "__rust_dealloc" | "__rust_deallocate" => Ok(Value::new_unit()),

        // ---- panic machinery --------------------------------------------
        "_Unwind_RaiseException" => {
            ctx.thread.panic_active = true;
            ctx.thread.panic_count += 1;
            ctx.thread.panic_value = args.into_iter().next();
            Ok(Value::new_unit())
        }
        "_Unwind_DeleteException" => Ok(Value::new_unit()),
        "rust_begin_unwind" | "panic_impl" | "__rust_start_panic" => {
            ctx.thread.panic_active = true;
            ctx.thread.panic_count += 1;
            ctx.thread.panic_value = args.into_iter().next();
            Ok(Value::new_unit())
        }

        // ---- memory and string utilities --------------------------------
        "memcmp" => {
            let n = int_arg(&args[2])? as usize;
            let (a, ao) = ptr_target(&args[0])?;
            let (b, bo) = ptr_target(&args[1])?;
            let mut ab = vec![0u8; n];
            let mut bb = vec![0u8; n];
            a.borrow().read_bytes(ao, &mut ab)?;
            b.borrow().read_bytes(bo, &mut bb)?;
            let r = match ab.cmp(&bb) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            };
            Ok(Value::new_i32(r))
        }
        "memchr" | "memrchr" => {
            let needle = int_arg(&args[1])? as u8;
            let n = int_arg(&args[2])? as usize;
            let (a, ao) = ptr_target(&args[0])?;
            let mut buf = vec![0u8; n];
            a.borrow().read_bytes(ao, &mut buf)?;
            let found = if name == "memchr" {
                buf.iter().position(|&b| b == needle)
            } else {
                buf.iter().rposition(|&b| b == needle)
            };
            match found {
                Some(i) => Ok(Value::new_pointer(
                    (ao + i) as u64,
                    RelocTarget::Alloc(a),
                )),
                None => Ok(null_ptr()),
            }
        }
        "strlen" => {
            let (a, ao) = ptr_target(&args[0])?;
            Ok(Value::new_usize(read_cstr(&a, ao)?.len() as u64))
        }
        "getenv" => {
            let (a, ao) = ptr_target(&args[0])?;
            let key = String::from_utf8_lossy(&read_cstr(&a, ao)?).into_owned();
            match std::env::var_os(&key) {
                Some(val) => {
                    let bytes = val.to_string_lossy().into_owned().into_bytes();
                    let out = AllocHandle::alloc(bytes.len() + 1);
                    out.borrow_mut().write_bytes(0, &bytes)?;
                    out.borrow_mut().write_bytes(bytes.len(), &[0])?;
                    Ok(Value::new_pointer(0, RelocTarget::Alloc(out)))
                }
                None => Ok(null_ptr()),
            }
        }
        // The environment is read-only from interpreted code.
        "setenv" => Ok(Value::new_i32(-1)),

        // ---- file descriptors and host I/O ------------------------------
        "write" => {
            let fd = int_arg(&args[0])?;
            let n = int_arg(&args[2])? as usize;
            let (a, ao) = ptr_target(&args[1])?;
            let mut buf = vec![0u8; n];
            a.borrow().read_bytes(ao, &mut buf)?;
            use std::io::Write;
            let _ = match fd {
                2 => std::io::stderr().write_all(&buf),
                _ => std::io::stdout().write_all(&buf),
            };
            Ok(Value::new_usize(n as u64))
        }
        "read" => Ok(Value::new_usize(0)),
        "close" | "fcntl" | "prctl" | "sigaction" | "sigaltstack" => Ok(Value::new_i32(0)),
        "open64" | "stat64" => Ok(Value::new_i32(-1)),
        "isatty" => Ok(Value::new_i32(0)),
        "signal" | "dlsym" | "GetProcAddress" => Ok(null_ptr()),

        // ---- threads (stubbed; no real concurrency) ---------------------
        "pthread_key_create" => {
            let key = alloc_tls_key();
            let (a, ao) = ptr_target(&args[0])?;
            a.borrow_mut().write_bytes(ao, &(key as u32).to_le_bytes())?;
            Ok(Value::new_i32(0))
        }
        "pthread_key_delete" => Ok(Value::new_i32(0)),
        "pthread_setspecific" => {
            let key = int_arg(&args[0])? as usize;
            ctx.thread.tls_set(key, Some(args[1].clone()));
            Ok(Value::new_i32(0))
        }
        "pthread_getspecific" => match ctx.thread.tls_get(int_arg(&args[0])? as usize) {
            Some(v) => Ok(v.clone()),
            None => Ok(null_ptr()),
        },
        "pthread_self" => Ok(Value::new_usize(1)),
        "pthread_attr_getstack" => {
            // Report a null stack base and zero size.
            let (base, bo) = ptr_target(&args[1])?;
            base.borrow_mut().write_usize(bo, 0)?;
            let (size, so) = ptr_target(&args[2])?;
            size.borrow_mut().write_usize(so, 0)?;
            Ok(Value::new_i32(0))
        }
        "pthread_attr_getguardsize" => {
            let (a, ao) = ptr_target(&args[1])?;
            a.borrow_mut().write_usize(ao, 4096)?;
            Ok(Value::new_i32(0))
        }
        name if name.starts_with("pthread_") => Ok(Value::new_i32(0)),

        "TlsAlloc" => Ok(Value::new_u64(alloc_tls_key() as u64, 4)),
        "TlsGetValue" => match ctx.thread.tls_get(int_arg(&args[0])? as usize) {
            Some(v) => Ok(v.clone()),
            None => Ok(null_ptr()),
        },
        "TlsSetValue" => {
            let key = int_arg(&args[0])? as usize;
            ctx.thread.tls_set(key, Some(args[1].clone()));
            Ok(Value::new_i32(1))
        }

        // ---- time and syscalls ------------------------------------------
        "clock_gettime" => {
            let (a, ao) = ptr_target(&args[1])?;
            a.borrow_mut().write_bytes(ao, &[0u8; 16])?;
            Ok(Value::new_i32(0))
        }
        "sysconf" => Ok(Value::new_u64(4096, 8)),
        "syscall" => Ok(Value::new_u64(-1i64 as u64, 8)),
        "__errno_location" => {
            let alloc = match &ctx.thread.errno {
                Some(a) => a.clone(),
                None => {
                    let a = AllocHandle::alloc(4);
                    a.borrow_mut().write_bytes(0, &[0; 4])?;
                    ctx.thread.errno = Some(a.clone());
                    a
                }
            };
            Ok(Value::new_pointer(0, RelocTarget::Alloc(alloc)))
        }

        // ---- Windows console --------------------------------------------
        "GetStdHandle" => {
            let n = int_arg(&args[0])?;
            // A valid host handle wrapped in a distinguished FFI pointer so
            // later reads recognise it.
            Ok(Value::new_pointer(
                n,
                RelocTarget::Ffi(FfiMarker {
                    name: "StdHandle",
                    key: n,
                }),
            ))
        }
        "WriteConsoleW" => {
            let handle_key = args[0].read_usize(0)?;
            let len = int_arg(&args[2])? as usize;
            let (a, ao) = ptr_target(&args[1])?;
            let mut buf = vec![0u8; len * 2];
            a.borrow().read_bytes(ao, &mut buf)?;
            let units: Vec<u16> = buf
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            let text = String::from_utf16_lossy(&units);
            use std::io::Write;
            // STD_ERROR_HANDLE is (DWORD)-12.
            let _ = if handle_key as u32 == 0xFFFF_FFF4 {
                std::io::stderr().write_all(text.as_bytes())
            } else {
                std::io::stdout().write_all(text.as_bytes())
            };
            if let Ok((w, wo)) = ptr_target(&args[3]) {
                w.borrow_mut().write_bytes(wo, &(len as u32).to_le_bytes())?;
            }
            Ok(Value::new_i32(1))
        }
        "GetConsoleMode" => {
            if let Ok((a, ao)) = ptr_target(&args[1]) {
                a.borrow_mut().write_bytes(ao, &[0; 4])?;
            }
            Ok(Value::new_i32(0))
        }
        "GetModuleHandleW" => Ok(Value::new_pointer(
            0,
            RelocTarget::Ffi(FfiMarker {
                name: "Module",
                key: 0,
            }),
        )),
        "AddVectoredExceptionHandler" => Ok(Value::new_usize(1)),
        "InitializeCriticalSection"
        | "EnterCriticalSection"
        | "LeaveCriticalSection"
        | "DeleteCriticalSection" => Ok(Value::new_unit()),
        "TryEnterCriticalSection" => Ok(Value::new_i32(1)),

        other => Err(EvalError::MissingExtern(other.to_string())),
    }
}
