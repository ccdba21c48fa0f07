//! Format strings and dependency trees
//!
//! | token | expands to |
//! |---|---|
//! | `$_` | package name |
//! | `$@` | `@version` |
//! | `$%` | `%compiler` |
//! | `$%@` | `%compiler@version` |
//! | `$+` | variants |
//! | `$=` | ` arch=platform-os-target` |
//! | `$#` | 7-character hash |
//! | `$/` | `/full-hash` |
//! | `$$` | `$` |
//! | `${PACKAGE}` `${VERSION}` `${COMPILER}` `${COMPILERNAME}` `${COMPILERVER}` `${ARCHITECTURE}` `${HASH}` `${HASH:n}` | the bare field |
//!
//! Unset fields of abstract specs expand to the empty string.

use crate::concrete::ConcreteSpec;
use crate::spec::Spec;
use spackle_errors::FormatError;
use spackle_hash::SHORT_HASH_LEN;

/// Default format for one line of a listing
pub const DEFAULT_FORMAT: &str = "$_$@$%@$+$=";

/// Field values a format string can reference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatFields {
    pub name: String,
    pub version: String,
    pub compiler_name: String,
    pub compiler_version: String,
    pub variants: String,
    pub arch: String,
    pub hash: Option<String>,
}

impl FormatFields {
    fn compiler(&self) -> String {
        if self.compiler_version.is_empty() {
            self.compiler_name.clone()
        } else {
            format!("{}@{}", self.compiler_name, self.compiler_version)
        }
    }

    fn hash(&self, len: Option<usize>) -> String {
        let hash = self.hash.as_deref().unwrap_or_default();
        match len {
            Some(len) => hash.chars().take(len).collect(),
            None => hash.to_string(),
        }
    }

    fn prefixed(prefix: &str, value: &str) -> String {
        if value.is_empty() {
            String::new()
        } else {
            format!("{prefix}{value}")
        }
    }
}

impl Spec {
    pub(crate) fn fields(&self) -> FormatFields {
        let compiler = self.compiler.as_ref();
        FormatFields {
            name: self.name_or_empty().to_string(),
            version: if self.versions.is_any() {
                String::new()
            } else {
                self.versions.to_string()
            },
            compiler_name: compiler.map(|c| c.name.clone()).unwrap_or_default(),
            compiler_version: compiler
                .filter(|c| !c.versions.is_any())
                .map(|c| c.versions.to_string())
                .unwrap_or_default(),
            variants: spackle_types::format_variants(&self.variants),
            arch: if self.arch.is_empty() {
                String::new()
            } else {
                self.arch.to_string()
            },
            hash: self.hash.clone(),
        }
    }

    /// Render with the format mini-language
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` for unknown tokens.
    pub fn format(&self, fmt: &str) -> Result<String, FormatError> {
        render(&self.fields(), fmt)
    }
}

/// Expand `fmt` against `fields`
///
/// # Errors
///
/// Returns `UnknownToken` for an unrecognised `$` sequence and
/// `Unterminated` for a `${` without its closing brace.
pub fn render(fields: &FormatFields, fmt: &str) -> Result<String, FormatError> {
    let chars: Vec<char> = fmt.chars().collect();
    let mut out = String::with_capacity(fmt.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let offset = i;
        let Some(&next) = chars.get(i + 1) else {
            return Err(FormatError::UnknownToken {
                token: "$".to_string(),
                offset,
            });
        };
        i += 2;
        match next {
            '_' => out.push_str(&fields.name),
            '@' => out.push_str(&FormatFields::prefixed("@", &fields.version)),
            '%' => {
                let name = FormatFields::prefixed("%", &fields.compiler_name);
                if chars.get(i) == Some(&'@') {
                    i += 1;
                    out.push_str(&name);
                    if !name.is_empty() {
                        out.push_str(&FormatFields::prefixed("@", &fields.compiler_version));
                    }
                } else {
                    out.push_str(&name);
                }
            }
            '+' => out.push_str(&fields.variants),
            '=' => out.push_str(&FormatFields::prefixed(" arch=", &fields.arch)),
            '#' => out.push_str(&fields.hash(Some(SHORT_HASH_LEN))),
            '/' => out.push_str(&FormatFields::prefixed("/", &fields.hash(None))),
            '$' => out.push('$'),
            '{' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == '}')
                    .ok_or(FormatError::Unterminated { offset })?;
                let name: String = chars[i..i + close].iter().collect();
                i += close + 1;
                out.push_str(&long_token(fields, &name, offset)?);
            }
            other => {
                return Err(FormatError::UnknownToken {
                    token: format!("${other}"),
                    offset,
                })
            }
        }
    }

    Ok(out)
}

fn long_token(fields: &FormatFields, name: &str, offset: usize) -> Result<String, FormatError> {
    let value = match name {
        "PACKAGE" => fields.name.clone(),
        "VERSION" => fields.version.clone(),
        "COMPILER" => fields.compiler(),
        "COMPILERNAME" => fields.compiler_name.clone(),
        "COMPILERVER" => fields.compiler_version.clone(),
        "ARCHITECTURE" => fields.arch.clone(),
        "HASH" => fields.hash(None),
        _ => match name.strip_prefix("HASH:").map(str::parse::<usize>) {
            Some(Ok(len)) => fields.hash(Some(len)),
            _ => {
                return Err(FormatError::UnknownToken {
                    token: format!("${{{name}}}"),
                    offset,
                })
            }
        },
    };
    Ok(value)
}

/// Options for [`tree`]
#[derive(Debug, Clone)]
pub struct TreeOptions {
    /// Format of each node line
    pub format: String,
    /// Prefix each line with this many hash characters
    pub hash_len: Option<usize>,
    /// Spaces before every line
    pub indent: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            hash_len: None,
            indent: 0,
        }
    }
}

/// Render the dependency tree of a concrete spec
///
/// Children are indented four spaces per level and marked with `^`. A node
/// reachable along several paths is shown once.
///
/// # Errors
///
/// Returns a `FormatError` if the node format is invalid.
pub fn tree(spec: &ConcreteSpec, opts: &TreeOptions) -> Result<String, FormatError> {
    let mut out = String::new();
    for (depth, node) in spec.traverse() {
        out.push_str(&" ".repeat(opts.indent));
        if let Some(len) = opts.hash_len {
            out.push_str(&node.hash.short(len));
            out.push_str("  ");
        }
        out.push_str(&"    ".repeat(depth));
        if depth > 0 {
            out.push('^');
        }
        out.push_str(&node.format(&opts.format)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> FormatFields {
        FormatFields {
            name: "zlib".to_string(),
            version: "1.2.13".to_string(),
            compiler_name: "gcc".to_string(),
            compiler_version: "12.2.0".to_string(),
            variants: "+shared".to_string(),
            arch: "linux-ubuntu22-x86_64".to_string(),
            hash: Some("0123456789abcdef".to_string()),
        }
    }

    #[test]
    fn test_short_tokens() {
        let f = fields();
        assert_eq!(
            render(&f, "$_$@$%@$+$=").unwrap(),
            "zlib@1.2.13%gcc@12.2.0+shared arch=linux-ubuntu22-x86_64"
        );
        assert_eq!(render(&f, "$_$%").unwrap(), "zlib%gcc");
        assert_eq!(render(&f, "$# $/ $$").unwrap(), "0123456 /0123456789abcdef $");
    }

    #[test]
    fn test_long_tokens() {
        let f = fields();
        assert_eq!(
            render(&f, "${ARCHITECTURE}/${COMPILERNAME}-${COMPILERVER}/${PACKAGE}-${VERSION}-${HASH:4}")
                .unwrap(),
            "linux-ubuntu22-x86_64/gcc-12.2.0/zlib-1.2.13-0123"
        );
        assert_eq!(render(&f, "${COMPILER}").unwrap(), "gcc@12.2.0");
        assert_eq!(render(&f, "${HASH}").unwrap(), "0123456789abcdef");
    }

    #[test]
    fn test_abstract_fields_are_empty() {
        let spec = Spec::parse("zlib+shared").unwrap();
        assert_eq!(spec.format("$_$@$%@$+$=$/").unwrap(), "zlib+shared");
        let spec = Spec::parse("zlib@1.2:%gcc").unwrap();
        assert_eq!(spec.format("$@ $%@ ${COMPILER}").unwrap(), "@1.2: %gcc gcc");
    }

    #[test]
    fn test_errors() {
        let f = fields();
        assert!(matches!(
            render(&f, "ok $x"),
            Err(FormatError::UnknownToken { ref token, offset: 3 }) if token == "$x"
        ));
        assert!(matches!(
            render(&f, "${NOPE}"),
            Err(FormatError::UnknownToken { ref token, .. }) if token == "${NOPE}"
        ));
        assert!(matches!(
            render(&f, "${HASH:x}"),
            Err(FormatError::UnknownToken { .. })
        ));
        assert!(matches!(
            render(&f, "a ${PACKAGE"),
            Err(FormatError::Unterminated { offset: 2 })
        ));
        assert!(matches!(render(&f, "$"), Err(FormatError::UnknownToken { .. })));
    }
}
