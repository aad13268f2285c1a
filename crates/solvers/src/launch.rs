//! Launch configuration handed to the kernel loader.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefineValue {
    Int(usize),
    Bool(bool),
}

impl From<usize> for DefineValue {
    fn from(value: usize) -> Self {
        DefineValue::Int(value)
    }
}

impl From<bool> for DefineValue {
    fn from(value: bool) -> Self {
        DefineValue::Bool(value)
    }
}

impl fmt::Display for DefineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineValue::Int(value) => write!(f, "{value}"),
            DefineValue::Bool(true) => f.write_str("1"),
            DefineValue::Bool(false) => f.write_str("0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompileToken {
    Define { name: String, value: DefineValue },
    /// Passed to the compiler verbatim.
    Flag(String),
}

impl fmt::Display for CompileToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileToken::Define { name, value } => write!(f, "-D{name}={value}"),
            CompileToken::Flag(flag) => f.write_str(flag),
        }
    }
}

/// Ordered compile-time symbols for a kernel build.
///
/// Kept structured until [`CompileOptions::render`] turns it into the
/// space-separated command-line form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    tokens: Vec<CompileToken>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: impl Into<DefineValue>) -> &mut Self {
        self.tokens.push(CompileToken::Define {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Blank flags are skipped.
    pub fn flag(&mut self, flag: impl Into<String>) -> &mut Self {
        let flag = flag.into();
        let flag = flag.trim();
        if !flag.is_empty() {
            self.tokens.push(CompileToken::Flag(flag.to_string()));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<DefineValue> {
        self.defines()
            .find(|(define, _)| *define == name)
            .map(|(_, value)| value)
    }

    pub fn defines(&self) -> impl Iterator<Item = (&str, DefineValue)> + '_ {
        self.tokens.iter().filter_map(|token| match token {
            CompileToken::Define { name, value } => Some((name.as_str(), *value)),
            CompileToken::Flag(_) => None,
        })
    }

    pub fn tokens(&self) -> &[CompileToken] {
        &self.tokens
    }

    pub fn render(&self) -> String {
        self.tokens
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Kernel source or code object plus its entry symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelAsset {
    pub file: String,
    pub entry: String,
}

impl KernelAsset {
    pub fn new(file: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            entry: entry.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfiguration {
    pub kernel: KernelAsset,
    /// Unused dimensions are 1.
    pub local_work_size: [usize; 3],
    pub global_work_size: [usize; 3],
    pub compile_options: CompileOptions,
    pub workspace_bytes: usize,
}

impl LaunchConfiguration {
    /// Work-groups launched along each dimension.
    pub fn work_groups(&self) -> [usize; 3] {
        let mut groups = [0; 3];
        for (dim, count) in groups.iter_mut().enumerate() {
            *count = self.global_work_size[dim].div_ceil(self.local_work_size[dim].max(1));
        }
        groups
    }
}
