//! Line-oriented text builder for generated shader sources.

use std::fmt::Display;

/// Accumulates shader text, indenting each new line with one tab per open
/// scope.
#[derive(Debug, Default)]
pub struct ShaderSourceBuilder {
    out: String,
    depth: usize,
    line_start: bool,
}

impl ShaderSourceBuilder {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            depth: 0,
            line_start: true,
        }
    }

    pub fn write(&mut self, text: impl Display) -> &mut Self {
        let text = text.to_string();
        if text.is_empty() {
            return self;
        }
        if self.line_start {
            for _ in 0..self.depth {
                self.out.push('\t');
            }
            self.line_start = false;
        }
        self.out.push_str(&text);
        self
    }

    pub fn write_line(&mut self, text: impl Display) -> &mut Self {
        self.write(text);
        self.out.push('\n');
        self.line_start = true;
        self
    }

    pub fn blank_line(&mut self) -> &mut Self {
        self.write_line("")
    }

    pub fn enter_scope(&mut self) -> &mut Self {
        self.write_line("{");
        self.depth += 1;
        self
    }

    pub fn exit_scope(&mut self) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.write_line("}")
    }

    /// Closes a `struct` body, which HLSL terminates with a semicolon.
    pub fn exit_scope_struct(&mut self) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.write_line("};")
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_indent_with_tabs() {
        let mut b = ShaderSourceBuilder::new();
        b.write_line("struct A").enter_scope();
        b.write("float ").write("x").write_line(";");
        b.exit_scope_struct();
        b.write_line("void f()").enter_scope().enter_scope();
        b.write_line("return;");
        b.exit_scope().exit_scope();
        assert_eq!(b.depth(), 0);
        assert_eq!(
            b.into_string(),
            "struct A\n{\n\tfloat x;\n};\nvoid f()\n{\n\t{\n\t\treturn;\n\t}\n}\n"
        );
    }

    #[test]
    fn blank_lines_carry_no_indent() {
        let mut b = ShaderSourceBuilder::new();
        b.enter_scope().blank_line().exit_scope();
        assert_eq!(b.into_string(), "{\n\n}\n");
    }
}
