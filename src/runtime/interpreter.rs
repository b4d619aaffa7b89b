//! Interpreter side of a runtime: everything that touches RustPython.
//!
//! An [`Engine`] is created on, and never leaves, its worker thread. The
//! handle talks to it by sending closures over a channel. All functions here
//! run with the VM entered.

use crate::utils::output::OutputBuffer;
use crate::utils::py_literal::string_literal;
use log::{debug, error, warn};
use rustpython_vm::{
    builtins::PyBaseExceptionRef,
    compiler::Mode,
    function::FuncArgs,
    scope::Scope,
    signal::{UserSignal, UserSignalReceiver},
    AsObject, Interpreter, PyObjectRef, PyResult, VirtualMachine,
};
use std::path::PathBuf;

/// Filename used for inline programs that have no backing file
pub const INLINE_FILENAME: &str = "<main>";

/// A program to run in a fresh `__main__` scope
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub source: String,
    /// Name compiled into code objects and shown in tracebacks
    pub filename: String,
    /// Value for `__file__`, when the program is a mounted file
    pub file_path: Option<String>,
    /// Global read back as text after the program finishes
    pub probe: Option<String>,
}

impl ExecRequest {
    pub fn inline(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filename: INLINE_FILENAME.to_string(),
            file_path: None,
            probe: None,
        }
    }

    pub fn mounted(source: impl Into<String>, path: String) -> Self {
        Self {
            source: source.into(),
            filename: path.clone(),
            file_path: Some(path),
            probe: None,
        }
    }

    pub fn with_probe(mut self, global: &str) -> Self {
        self.probe = Some(global.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Source did not compile
    Compile,
    /// Uncaught exception
    Runtime,
    /// The engine could not set the run up
    Internal,
}

#[derive(Debug, Clone)]
pub struct ExecFailure {
    pub kind: FailureKind,
    /// Rendered traceback or compiler message
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    pub failure: Option<ExecFailure>,
    pub probe: Option<String>,
}

impl ExecOutcome {
    fn failed(kind: FailureKind, message: String) -> Self {
        Self {
            failure: Some(ExecFailure { kind, message }),
            probe: None,
        }
    }
}

/// One embedded interpreter bound to a project root
pub struct Engine {
    interp: Interpreter,
    project_root: String,
}

impl Engine {
    /// Build the interpreter with the native stdlib modules registered.
    ///
    /// Closures sent on the paired sender of `interrupts` run between
    /// bytecode instructions; see [`interrupt_signal`].
    pub fn bootstrap(
        stdlib_paths: &[PathBuf],
        project_root: String,
        interrupts: UserSignalReceiver,
    ) -> Self {
        let mut settings = rustpython_vm::Settings::default();
        for path in stdlib_paths {
            settings.path_list.push(path.display().to_string());
        }

        let interp = Interpreter::with_init(settings, move |vm| {
            vm.add_native_modules(rustpython_stdlib::get_module_inits());
            vm.set_user_signal_channel(interrupts);
        });

        Self {
            interp,
            project_root,
        }
    }

    /// Verify the interpreter can import and run code
    pub fn probe(&self) -> Result<(), String> {
        self.run_snippet("import sys\n_pybox_ready = len(sys.path) >= 0\n")
    }

    /// Put the project root at the front of `sys.path` unless it is there already.
    /// Bytecode caching is off: edits within the same second must be picked up.
    pub fn register_project_path(&self) -> Result<(), String> {
        let source = format!(
            "import sys\n\
             sys.dont_write_bytecode = True\n\
             if {root} not in sys.path:\n    sys.path.insert(0, {root})\n",
            root = string_literal(&self.project_root)
        );
        self.run_snippet(&source)
    }

    /// Run a helper snippet in a throwaway scope without capturing output
    pub fn run_snippet(&self, source: &str) -> Result<(), String> {
        self.interp.enter(|vm| exec_snippet(vm, source))
    }

    /// Run a program with stdout captured into `output`.
    ///
    /// Modules previously imported from the project root are evicted first so
    /// the program sees the files as currently mounted.
    pub fn execute(&self, request: &ExecRequest, output: &OutputBuffer) -> ExecOutcome {
        self.interp.enter(|vm| {
            if let Err(e) = exec_snippet(vm, &self.eviction_snippet()) {
                warn!("could not evict project modules: {}", e);
            }

            let redirect = match StdoutRedirect::install(vm, output.clone()) {
                Ok(redirect) => redirect,
                Err(e) => return ExecOutcome::failed(FailureKind::Internal, e),
            };
            let outcome = run_program(vm, request);
            drop(redirect);
            outcome
        })
    }

    fn eviction_snippet(&self) -> String {
        let mut prefix = self.project_root.clone();
        if !prefix.ends_with(std::path::MAIN_SEPARATOR) {
            prefix.push(std::path::MAIN_SEPARATOR);
        }
        format!(
            "import sys\n\
             for _pybox_name, _pybox_mod in list(sys.modules.items()):\n    \
                 _pybox_file = getattr(_pybox_mod, '__file__', None)\n    \
                 if isinstance(_pybox_file, str) and _pybox_file.startswith({prefix}):\n        \
                     del sys.modules[_pybox_name]\n\
             sys.path_importer_cache.clear()\n",
            prefix = string_literal(&prefix)
        )
    }
}

/// Signal that aborts the running program with `KeyboardInterrupt`.
///
/// `KeyboardInterrupt` is not an `Exception`, so learner `except Exception`
/// blocks and the test driver do not swallow it.
pub fn interrupt_signal() -> UserSignal {
    Box::new(|vm: &VirtualMachine| {
        Err(vm.new_exception_msg(
            vm.ctx.exceptions.keyboard_interrupt.to_owned(),
            "execution budget exceeded".to_owned(),
        ))
    })
}

/// Swaps `sys.stdout` for a capturing writer and puts the previous sink back on drop.
struct StdoutRedirect<'vm> {
    vm: &'vm VirtualMachine,
    previous: PyObjectRef,
}

impl<'vm> StdoutRedirect<'vm> {
    fn install(vm: &'vm VirtualMachine, output: OutputBuffer) -> Result<Self, String> {
        let previous = vm
            .sys_module
            .get_attr("stdout", vm)
            .unwrap_or_else(|_| vm.ctx.none());
        let writer = writer_object(vm, output);
        vm.sys_module
            .set_attr("stdout", writer, vm)
            .map_err(|exc| render_exception(vm, &exc))?;
        Ok(Self { vm, previous })
    }
}

impl Drop for StdoutRedirect<'_> {
    fn drop(&mut self) {
        if let Err(exc) = self
            .vm
            .sys_module
            .set_attr("stdout", self.previous.clone(), self.vm)
        {
            error!(
                "failed to restore sys.stdout: {}",
                render_exception(self.vm, &exc)
            );
        }
    }
}

/// Minimal file-like object whose `write` appends to `output`
fn writer_object(vm: &VirtualMachine, output: OutputBuffer) -> PyObjectRef {
    let write_fn = vm.new_function(
        "write",
        move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            let text = match args.args.first() {
                Some(obj) => obj.str(vm)?.as_str().to_owned(),
                None => String::new(),
            };
            output.write_str(&text);
            Ok(vm.ctx.new_int(text.chars().count()).into())
        },
    );
    let flush_fn = vm.new_function(
        "flush",
        |_args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> { Ok(vm.ctx.none()) },
    );

    let ns = vm.new_module("<pybox-stdout>", vm.ctx.new_dict(), None);
    let _ = ns.set_attr("write", write_fn, vm);
    let _ = ns.set_attr("flush", flush_fn, vm);
    let _ = ns.set_attr("closed", vm.ctx.new_bool(false), vm);
    let _ = ns.set_attr("encoding", vm.ctx.new_str("utf-8"), vm);
    ns.into()
}

fn run_program(vm: &VirtualMachine, request: &ExecRequest) -> ExecOutcome {
    let code = match vm.compile(&request.source, Mode::Exec, request.filename.clone()) {
        Ok(code) => code,
        Err(e) => return ExecOutcome::failed(FailureKind::Compile, e.to_string()),
    };

    let scope = vm.new_scope_with_builtins();
    let _ = scope
        .globals
        .set_item("__name__", vm.ctx.new_str("__main__").into(), vm);
    if let Some(path) = &request.file_path {
        let _ = scope
            .globals
            .set_item("__file__", vm.ctx.new_str(path.as_str()).into(), vm);
    }

    let result = vm.run_code_obj(code, scope.clone());
    let probe = request
        .probe
        .as_deref()
        .and_then(|name| read_global(vm, &scope, name));

    match result {
        Ok(_) => ExecOutcome {
            failure: None,
            probe,
        },
        Err(exc) => {
            debug!("program raised: {}", exception_summary(vm, &exc));
            ExecOutcome {
                failure: Some(ExecFailure {
                    kind: FailureKind::Runtime,
                    message: render_exception(vm, &exc),
                }),
                probe,
            }
        }
    }
}

fn exec_snippet(vm: &VirtualMachine, source: &str) -> Result<(), String> {
    let code = vm
        .compile(source, Mode::Exec, "<pybox>".to_owned())
        .map_err(|e| e.to_string())?;
    let scope = vm.new_scope_with_builtins();
    vm.run_code_obj(code, scope)
        .map(|_| ())
        .map_err(|exc| render_exception(vm, &exc))
}

/// Text of a global, or `None` when it is unset or `None`
fn read_global(vm: &VirtualMachine, scope: &Scope, name: &str) -> Option<String> {
    let globals: PyObjectRef = scope.globals.clone().into();
    let value = vm
        .call_method(&globals, "get", (vm.ctx.new_str(name),))
        .ok()?;
    if vm.is_none(&value) {
        return None;
    }
    value.str(vm).ok().map(|s| s.as_str().to_owned())
}

/// Full traceback, falling back to `str(exc)`
fn render_exception(vm: &VirtualMachine, exc: &PyBaseExceptionRef) -> String {
    let mut traceback = String::new();
    if vm.write_exception(&mut traceback, exc).is_ok() && !traceback.trim().is_empty() {
        return traceback.trim_end().to_string();
    }
    exception_summary(vm, exc)
}

fn exception_summary(vm: &VirtualMachine, exc: &PyBaseExceptionRef) -> String {
    let class_name = String::from(&*exc.as_object().class().name());
    match exc.as_object().str(vm) {
        Ok(text) if !text.as_str().is_empty() => format!("{}: {}", class_name, text.as_str()),
        _ => class_name,
    }
}
