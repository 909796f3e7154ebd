//! Indented line writer for generated Rust.
const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct Source {
    text: String,
    depth: usize,
}

impl Source {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if !line.is_empty() {
            for _ in 0..self.depth {
                self.text.push_str(INDENT);
            }
            self.text.push_str(line);
        }
        self.text.push('\n');
    }

    pub fn blank(&mut self) {
        self.text.push('\n');
    }

    /// Write `line` and indent what follows.
    pub fn open(&mut self, line: impl AsRef<str>) {
        self.line(line);
        self.depth += 1;
    }

    /// Dedent, then write `line`.
    pub fn close(&mut self, line: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(line);
    }

    /// `fn` item whose body is the single expression `body`.
    pub fn function(&mut self, signature: impl AsRef<str>, body: impl AsRef<str>) {
        self.open(format!("{} {{", signature.as_ref()));
        self.line(body);
        self.close("}");
    }

    pub fn into_string(self) -> String {
        self.text
    }
}
