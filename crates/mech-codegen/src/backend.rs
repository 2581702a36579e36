use crate::error::CodegenError;
use crate::kernkraft::KernkraftBackend;
use crate::layout::{FieldKind, Layout};
use crate::printer::CodePrinter;
use std::fmt;
use std::str::FromStr;

mech_core::common_enum! {
    #[derive(Copy, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum BackendKind {
        #[default]
        C,
        Kernkraft,
    }
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::C => "c",
            BackendKind::Kernkraft => "kernkraft",
        }
    }

    pub fn create(&self) -> Box<dyn CodegenBackend> {
        match self {
            BackendKind::C => Box::new(CBackend),
            BackendKind::Kernkraft => Box::new(KernkraftBackend),
        }
    }
}

impl FromStr for BackendKind {
    type Err = CodegenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" => Ok(BackendKind::C),
            "kernkraft" | "kerncraft" => Ok(BackendKind::Kernkraft),
            _ => Err(CodegenError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level pieces of a translation unit, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routine {
    GlobalStore,
    InstanceLayout,
    Functions,
    Init,
    Current,
    State,
    NetReceive,
}

/// Per-instance loops of the generated kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Init,
    Current,
    State,
}

impl Kernel {
    pub fn function_name(&self, mechanism: &str) -> String {
        match self {
            Kernel::Init => format!("nrn_init_{mechanism}"),
            Kernel::Current => format!("nrn_cur_{mechanism}"),
            Kernel::State => format!("nrn_state_{mechanism}"),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Kernel::Init => "initialize instances",
            Kernel::Current => "update currents",
            Kernel::State => "update state",
        }
    }
}

/// Names and layouts that differ between output flavours. The default
/// methods produce the C runtime interface.
pub trait CodegenBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn extension(&self) -> &'static str;

    fn routines(&self) -> &'static [Routine] {
        &[
            Routine::GlobalStore,
            Routine::InstanceLayout,
            Routine::Functions,
            Routine::Init,
            Routine::Current,
            Routine::State,
            Routine::NetReceive,
        ]
    }

    fn includes(&self) -> &'static [&'static str] {
        &["<math.h>", "\"mech_runtime.h\""]
    }

    /// Storage qualifier for runtime variables owned elsewhere.
    fn extern_keyword(&self) -> &'static str {
        "extern "
    }

    fn instance_variable(&self, field: &str, index: &str) -> String {
        format!("inst->{field}[{index}]")
    }

    fn global_variable(&self, mechanism: &str, name: &str) -> String {
        format!("{mechanism}_global.{name}")
    }

    fn thread_variable(&self, name: &str) -> String {
        format!("nt->{name}")
    }

    /// Leading parameters of every generated function.
    fn context_params(&self, mechanism: &str, float: &str) -> String {
        format!("{mechanism}_Instance* inst, NrnThread* nt, int id, {float} v")
    }

    fn context_args(&self, voltage: &str) -> String {
        format!("inst, nt, id, {voltage}")
    }

    /// Leading parameters of runtime event functions.
    fn runtime_params(&self) -> &'static str {
        "NrnThread* nt, int id"
    }

    fn runtime_args(&self) -> &'static str {
        "nt, id"
    }

    fn print_global_store(&self, printer: &mut CodePrinter, layout: &Layout, mechanism: &str, float: &str) {
        if layout.globals.is_empty() {
            return;
        }
        printer.push_line(&format!("/** global variables of {mechanism} */"));
        printer.start_block("typedef struct");
        for global in &layout.globals {
            match global.length {
                Some(length) => printer.push_line(&format!("{float} {}[{length}];", global.name)),
                None => printer.push_line(&format!("{float} {};", global.name)),
            }
        }
        printer.end_block_with(&format!(" {mechanism}_Store;"));
        printer.push_blank_line();
        printer.start_block(&format!("static {mechanism}_Store {mechanism}_global ="));
        for global in &layout.globals {
            let value = match (global.length, &global.value) {
                (Some(_), _) => "{0}".to_string(),
                (None, Some(value)) => value.clone(),
                (None, None) => "0.0".to_string(),
            };
            printer.push_line(&format!(".{} = {value},", global.name));
        }
        printer.end_block_with(";");
    }

    fn print_instance_layout(&self, printer: &mut CodePrinter, layout: &Layout, mechanism: &str, float: &str) {
        printer.push_line("/** all mechanism instance variables */");
        printer.start_block("typedef struct");
        if layout.instance.is_empty() {
            printer.push_line("int unused;");
        }
        for field in &layout.instance {
            let ty = match field.kind {
                FieldKind::Float => format!("{float}*"),
                FieldKind::Pointer => format!("{float}**"),
                FieldKind::Opaque => "void**".to_string(),
            };
            printer.push_line(&format!("{ty} {};", field.name));
        }
        printer.end_block_with(&format!(" {mechanism}_Instance;"));
    }

    /// Everything up to and including the opening of the instance loop,
    /// leaving `id` and `v` in scope.
    fn print_kernel_begin(&self, printer: &mut CodePrinter, kernel: Kernel, mechanism: &str, float: &str) {
        printer.push_line(&format!("/** {} */", kernel.description()));
        printer.start_block(&format!(
            "void {}(NrnThread* nt, Memb_list* ml, int type)",
            kernel.function_name(mechanism)
        ));
        printer.push_line(&format!("{mechanism}_Instance* inst = ({mechanism}_Instance*) ml->instance;"));
        printer.push_line("int nodecount = ml->nodecount;");
        printer.start_block("for (int id = 0; id < nodecount; id++)");
        printer.push_line("int node_id = ml->nodeindices[id];");
        printer.push_line(&format!("{float} v = nt->voltage[node_id];"));
    }

    fn print_kernel_end(&self, printer: &mut CodePrinter) {
        printer.end_block();
        printer.end_block();
    }

    /// Add the current `rhs` and its conductance `g` to the cable matrix.
    fn print_matrix_update(&self, printer: &mut CodePrinter) {
        printer.push_line("nt->vec_rhs[node_id] -= rhs;");
        printer.push_line("nt->vec_d[node_id] += g;");
    }
}

/// Plain C against the runtime's `NrnThread`/`Memb_list` interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct CBackend;

impl CodegenBackend for CBackend {
    fn name(&self) -> &'static str {
        "C"
    }

    fn extension(&self) -> &'static str {
        ".c"
    }
}
