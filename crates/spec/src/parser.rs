//! Spec text parser
//!
//! ```text
//! hdf5@1.10:1.12 %gcc@9: +mpi~fortran api=v18 arch=linux-ubuntu22-x86_64 ^openmpi@4
//! ```
//!
//! Whitespace separates tokens. Modifiers bind to the nearest preceding
//! package name; a bare name after a complete spec starts the next spec.

use crate::spec::Spec;
use spackle_errors::ParseError;
use spackle_types::{ArchSpec, CompilerSpec, VariantValue, VersionList};

/// Parse every spec in `text`
///
/// # Errors
///
/// Returns a `ParseError` pointing at the offending column.
pub fn parse_specs(text: &str) -> Result<Vec<Spec>, ParseError> {
    Parser::new(text).parse_all()
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':' | ',')
}

fn is_value_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '^' | '@' | '%' | '+' | '~' | '/' | '=')
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> ParseError {
        ParseError::new(message, self.input, offset)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn name(&mut self) -> String {
        if self.peek().is_some_and(is_name_start) {
            self.take_while(is_name_char)
        } else {
            String::new()
        }
    }

    fn parse_all(mut self) -> Result<Vec<Spec>, ParseError> {
        let mut specs = Vec::new();
        let mut current: Option<Spec> = None;
        // Dependency currently receiving modifiers
        let mut dep: Option<String> = None;

        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else { break };
            let start = self.pos;

            match c {
                '^' => {
                    self.pos += 1;
                    self.skip_whitespace();
                    let name_start = self.pos;
                    let name = self.name();
                    if name.is_empty() {
                        return Err(self.error("expected package name after '^'", name_start));
                    }
                    let root = current.get_or_insert_with(Spec::anonymous);
                    if root.dependencies.contains_key(&name) {
                        return Err(self.error(format!("duplicate dependency '{name}'"), name_start));
                    }
                    root.dependencies.insert(name.clone(), Spec::new(name.clone()));
                    dep = Some(name);
                }
                '-' => {
                    self.pos += 1;
                    let spec = target(&mut current, dep.as_deref());
                    self.switch(spec, false, start)?;
                }
                c if is_name_start(c) => {
                    let word = self.name();
                    if self.peek() == Some('=') {
                        self.pos += 1;
                        let spec = target(&mut current, dep.as_deref());
                        self.key_value(spec, &word, start)?;
                    } else {
                        if let Some(done) = current.take() {
                            specs.push(done);
                        }
                        current = Some(Spec::new(word));
                        dep = None;
                    }
                }
                '@' | '%' | '+' | '~' | '/' => {}
                other => {
                    return Err(self.error(format!("unexpected character '{other}'"), start));
                }
            }

            let spec = target(&mut current, dep.as_deref());
            self.modifiers(spec)?;
        }

        specs.extend(current);
        Ok(specs)
    }

    /// Attached modifiers up to the next whitespace
    fn modifiers(&mut self, spec: &mut Spec) -> Result<(), ParseError> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                break;
            }
            let start = self.pos;
            self.pos += 1;
            match c {
                '@' => {
                    if !spec.versions.is_any() {
                        return Err(self.error("duplicate version constraint", start));
                    }
                    spec.versions = self.version_list(start)?;
                }
                '%' => {
                    if spec.compiler.is_some() {
                        return Err(self.error("duplicate compiler", start));
                    }
                    let name = self.name();
                    if name.is_empty() {
                        return Err(self.error("expected compiler name after '%'", self.pos));
                    }
                    let mut compiler = CompilerSpec::new(name);
                    if self.peek() == Some('@') {
                        let at = self.pos;
                        self.pos += 1;
                        compiler.versions = self.version_list(at)?;
                    }
                    spec.compiler = Some(compiler);
                }
                '+' => self.switch(spec, true, start)?,
                '~' => self.switch(spec, false, start)?,
                '/' => {
                    if spec.hash.is_some() {
                        return Err(self.error("duplicate hash", start));
                    }
                    let hash = self.take_while(|c| c.is_ascii_alphanumeric());
                    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                        return Err(self.error("expected hexadecimal hash after '/'", start + 1));
                    }
                    spec.hash = Some(hash.to_ascii_lowercase());
                }
                other => {
                    return Err(self.error(format!("unexpected character '{other}'"), start));
                }
            }
        }
        Ok(())
    }

    fn version_list(&mut self, at: usize) -> Result<VersionList, ParseError> {
        let text = self.take_while(is_version_char);
        if text.is_empty() {
            return Err(self.error("expected version after '@'", at + 1));
        }
        text.parse()
            .map_err(|e| self.error(format!("invalid version list '{text}': {e}"), at + 1))
    }

    /// `+name`, `~name` or `-name` with the sigil already consumed
    fn switch(&mut self, spec: &mut Spec, on: bool, start: usize) -> Result<(), ParseError> {
        let name = self.name();
        if name.is_empty() {
            return Err(self.error("expected variant name", start + 1));
        }
        if spec.variants.contains_key(&name) {
            return Err(self.error(format!("duplicate variant '{name}'"), start));
        }
        spec.variants.insert(name, VariantValue::Bool(on));
        Ok(())
    }

    /// `key=value[,value...]` with `key=` already consumed
    fn key_value(&mut self, spec: &mut Spec, key: &str, start: usize) -> Result<(), ParseError> {
        let value_start = self.pos;
        let value = self.take_while(is_value_char);
        if value.is_empty() {
            return Err(self.error(format!("expected value for '{key}'"), value_start));
        }

        match key {
            "arch" | "architecture" => {
                if !spec.arch.is_empty() {
                    return Err(self.error("duplicate architecture", start));
                }
                spec.arch = ArchSpec::from_triplet(&value).ok_or_else(|| {
                    self.error(
                        format!("malformed architecture '{value}', expected platform-os-target"),
                        value_start,
                    )
                })?;
            }
            "platform" | "os" | "target" => {
                let field = match key {
                    "platform" => &mut spec.arch.platform,
                    "os" => &mut spec.arch.os,
                    _ => &mut spec.arch.target,
                };
                if field.is_some() {
                    return Err(self.error(format!("duplicate {key}"), start));
                }
                *field = Some(value);
            }
            _ => {
                if spec.variants.contains_key(key) {
                    return Err(self.error(format!("duplicate variant '{key}'"), start));
                }
                let parsed = match value.as_str() {
                    "true" => VariantValue::Bool(true),
                    "false" => VariantValue::Bool(false),
                    _ => {
                        if value.split(',').any(str::is_empty) {
                            return Err(self.error(
                                format!("empty value in '{key}={value}'"),
                                value_start,
                            ));
                        }
                        VariantValue::from_values(value.split(','))
                    }
                };
                spec.variants.insert(key.to_string(), parsed);
            }
        }
        Ok(())
    }
}

/// The spec receiving modifiers: the open dependency, else the root
fn target<'s>(current: &'s mut Option<Spec>, dep: Option<&str>) -> &'s mut Spec {
    let root = current.get_or_insert_with(Spec::anonymous);
    match dep {
        Some(name) => root
            .dependencies
            .entry(name.to_string())
            .or_insert_with(|| Spec::new(name)),
        None => root,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spackle_types::Version;

    fn one(text: &str) -> Spec {
        let mut specs = parse_specs(text).unwrap();
        assert_eq!(specs.len(), 1, "{text}");
        specs.remove(0)
    }

    fn err(text: &str) -> ParseError {
        parse_specs(text).unwrap_err()
    }

    #[test]
    fn test_full_spec() {
        let spec = one("hdf5@1.10:1.12 %gcc@9: +mpi~fortran api=v18 arch=linux-ubuntu22-x86_64 ^openmpi@4 +cuda");
        assert_eq!(spec.name.as_deref(), Some("hdf5"));
        assert!(spec.versions.contains(&Version::parse("1.12.2").unwrap()));
        assert_eq!(spec.compiler.as_ref().unwrap().to_string(), "gcc@9:");
        assert_eq!(spec.variants["mpi"], VariantValue::Bool(true));
        assert_eq!(spec.variants["fortran"], VariantValue::Bool(false));
        assert_eq!(spec.variants["api"], VariantValue::single("v18"));
        assert_eq!(spec.arch.target.as_deref(), Some("x86_64"));

        let mpi = &spec.dependencies["openmpi"];
        assert_eq!(mpi.versions.to_string(), "4");
        assert_eq!(mpi.variants["cuda"], VariantValue::Bool(true));
    }

    #[test]
    fn test_dash_switch_at_token_start() {
        let spec = one("foo-bar -debug");
        assert_eq!(spec.name.as_deref(), Some("foo-bar"));
        assert_eq!(spec.variants["debug"], VariantValue::Bool(false));
    }

    #[test]
    fn test_multiple_specs() {
        let specs = parse_specs("foo@1.0 bar ^baz qux+x").unwrap();
        let names: Vec<_> = specs.iter().map(Spec::name_or_empty).collect();
        assert_eq!(names, ["foo", "bar", "qux"]);
        assert!(specs[1].dependencies.contains_key("baz"));
    }

    #[test]
    fn test_anonymous_specs() {
        let spec = one("+mpi cxxstd=17");
        assert!(spec.is_anonymous());
        assert_eq!(spec.variants.len(), 2);

        let spec = one("%intel");
        assert_eq!(spec.compiler.unwrap().name, "intel");

        let spec = one("^mpich");
        assert!(spec.is_anonymous());
        assert!(spec.dependencies.contains_key("mpich"));
    }

    #[test]
    fn test_arch_fields() {
        let spec = one("foo arch=linux--");
        assert_eq!(spec.arch.platform.as_deref(), Some("linux"));
        assert_eq!(spec.arch.os, None);

        let spec = one("foo os=ubuntu22 target=aarch64");
        assert_eq!(spec.arch.to_string(), "-ubuntu22-aarch64");
    }

    #[test]
    fn test_multi_values_and_bool_values() {
        let spec = one("foo languages=c,fortran shared=false");
        assert_eq!(spec.variants["languages"], VariantValue::from_values(["c", "fortran"]));
        assert_eq!(spec.variants["shared"], VariantValue::Bool(false));
    }

    #[test]
    fn test_hash() {
        let spec = one("foo/ABC123");
        assert_eq!(spec.hash.as_deref(), Some("abc123"));
        let spec = one("/abc123");
        assert!(spec.is_anonymous());
    }

    #[test]
    fn test_error_offsets() {
        let e = err("foo@1.0 !bar");
        assert_eq!(e.offset, 8);
        assert_eq!(e.diagnostic(), "unexpected character '!'\nfoo@1.0 !bar\n        ^");

        assert_eq!(err("foo ^").offset, 5);
        assert!(err("foo ^ @1").message.contains("after '^'"));
        assert!(err("foo@1.0@2.0").message.contains("duplicate version"));
        assert!(err("foo%gcc%intel").message.contains("duplicate compiler"));
        assert!(err("foo+x~x").message.contains("duplicate variant"));
        assert!(err("foo ^bar ^bar").message.contains("duplicate dependency"));
        assert!(err("foo /xyz").message.contains("hexadecimal"));
        assert!(err("foo arch=linux-x86_64").message.contains("malformed architecture"));
        assert!(err("foo@1:2:3").message.contains("invalid version list"));
        assert!(err("foo@").message.contains("expected version"));
        assert!(err("foo k=a,,b").message.contains("empty value"));
    }
}
