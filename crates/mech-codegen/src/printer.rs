/// Line-oriented text sink with brace-aware indentation.
#[derive(Debug, Default)]
pub struct CodePrinter {
    code: String,
    indent: usize,
}

impl CodePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(mut self) -> String {
        while self.code.ends_with("\n\n") {
            self.code.pop();
        }
        self.code
    }

    pub fn push_line(&mut self, line: &str) {
        if line.is_empty() {
            self.code.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.code.push_str("    ");
        }
        self.code.push_str(line);
        self.code.push('\n');
    }

    /// At most one empty line between two declarations.
    pub fn push_blank_line(&mut self) {
        if self.code.is_empty() || self.code.ends_with("\n\n") {
            return;
        }
        self.code.push('\n');
    }

    pub fn push_comment(&mut self, message: &str) {
        self.push_line(&format!("/* {message} */"));
    }

    /// `header {` and one level deeper.
    pub fn start_block(&mut self, header: &str) {
        if header.is_empty() {
            self.push_line("{");
        } else {
            self.push_line(&format!("{header} {{"));
        }
        self.indent += 1;
    }

    /// `} header {` at the same level, for `else` chains.
    pub fn chain_block(&mut self, header: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.push_line(&format!("}} {header} {{"));
        self.indent += 1;
    }

    pub fn end_block(&mut self) {
        self.end_block_with("");
    }

    /// Closing brace followed by `suffix`, e.g. `;` or ` hh_Instance;`.
    pub fn end_block_with(&mut self, suffix: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.push_line(&format!("}}{suffix}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_blocks_indent_by_four() {
        let mut printer = CodePrinter::new();
        printer.start_block("if (a)");
        printer.push_line("b = 1;");
        printer.chain_block("else");
        printer.start_block("");
        printer.push_line("c = 2;");
        printer.end_block();
        printer.end_block();
        printer.push_blank_line();
        printer.push_blank_line();
        assert_eq!(
            printer.finish(),
            "if (a) {\n    b = 1;\n} else {\n    {\n        c = 2;\n    }\n}\n"
        );
    }
}
