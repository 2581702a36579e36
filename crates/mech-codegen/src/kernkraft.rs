//! Loop-kernel flavour of the C backend for static performance analysis.
//!
//! Instance storage becomes flat `double x[N]` arrays, the kernels are bare
//! loops over `id` without a runtime interface, and only the current and
//! state kernels are emitted. Each kernel is its own brace scope.

use crate::backend::{CodegenBackend, Kernel, Routine};
use crate::layout::{FieldKind, Layout};
use crate::printer::CodePrinter;

#[derive(Debug, Clone, Copy, Default)]
pub struct KernkraftBackend;

impl CodegenBackend for KernkraftBackend {
    fn name(&self) -> &'static str {
        "C-Kernkraft (api-compatibility)"
    }

    fn extension(&self) -> &'static str {
        ".kr.c"
    }

    fn routines(&self) -> &'static [Routine] {
        &[
            Routine::GlobalStore,
            Routine::InstanceLayout,
            Routine::Functions,
            Routine::Current,
            Routine::State,
        ]
    }

    fn includes(&self) -> &'static [&'static str] {
        &["<math.h>"]
    }

    fn extern_keyword(&self) -> &'static str {
        ""
    }

    fn instance_variable(&self, field: &str, index: &str) -> String {
        format!("{field}[{index}]")
    }

    fn global_variable(&self, _mechanism: &str, name: &str) -> String {
        name.to_string()
    }

    fn thread_variable(&self, name: &str) -> String {
        name.to_string()
    }

    fn context_params(&self, _mechanism: &str, float: &str) -> String {
        format!("int id, {float} v")
    }

    fn context_args(&self, voltage: &str) -> String {
        format!("id, {voltage}")
    }

    fn runtime_params(&self) -> &'static str {
        "int id"
    }

    fn runtime_args(&self) -> &'static str {
        "id"
    }

    fn print_global_store(&self, printer: &mut CodePrinter, layout: &Layout, _mechanism: &str, float: &str) {
        printer.push_line("/** global variables */");
        for global in &layout.globals {
            match (global.length, &global.value) {
                (Some(length), _) => printer.push_line(&format!("{float} {}[{length}];", global.name)),
                (None, Some(value)) => printer.push_line(&format!("{float} {} = {value};", global.name)),
                (None, None) => printer.push_line(&format!("{float} {};", global.name)),
            }
        }
        printer.push_line(&format!("{float} t;"));
        printer.push_line(&format!("{float} dt;"));
    }

    fn print_instance_layout(&self, printer: &mut CodePrinter, layout: &Layout, _mechanism: &str, float: &str) {
        printer.push_line("/** all mechanism instance variables */");
        for field in &layout.instance {
            let ty = match field.kind {
                FieldKind::Float => float.to_string(),
                FieldKind::Pointer => format!("{float}*"),
                FieldKind::Opaque => "void*".to_string(),
            };
            printer.push_line(&format!("{ty} {}[N];", field.name));
        }
        printer.push_line(&format!("{float} voltage[N];"));
        printer.push_line(&format!("{float} vec_rhs[N];"));
        printer.push_line(&format!("{float} vec_d[N];"));
    }

    fn print_kernel_begin(&self, printer: &mut CodePrinter, kernel: Kernel, _mechanism: &str, float: &str) {
        printer.push_line(&format!("/** {} */", kernel.description()));
        printer.start_block("");
        printer.push_line("int start = 0;");
        printer.push_line("int end = N;");
        printer.push_line("int id;");
        printer.push_line(&format!("{float} v;"));
        printer.start_block("for (id = start; id < end; id++)");
        printer.push_line("v = voltage[id];");
    }

    fn print_kernel_end(&self, printer: &mut CodePrinter) {
        printer.end_block();
        printer.end_block();
    }

    fn print_matrix_update(&self, printer: &mut CodePrinter) {
        printer.push_line("vec_rhs[id] -= rhs;");
        printer.push_line("vec_d[id] += g;");
    }
}
