//! Grouped listing of installed specs

use console::{measure_text_width, Style, Term};
use spackle_errors::FormatError;
use spackle_spec::{tree, ConcreteSpec, TreeOptions};
use spackle_types::{Arch, ColorChoice, Compiler};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Relative install prefix of a package
pub const INSTALL_LAYOUT: &str =
    "${ARCHITECTURE}/${COMPILERNAME}-${COMPILERVER}/${PACKAGE}-${VERSION}-${HASH}";

/// How each spec of a group is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Names and versions in columns
    #[default]
    Short,
    /// One spec per line followed by its install prefix
    Paths,
    /// The dependency tree of every spec
    Deps,
}

/// Options for [`display_specs`]
#[derive(Debug, Clone)]
pub struct DisplayOptions {
    pub mode: DisplayMode,
    /// Show this many hash characters before each spec
    pub hashes: Option<usize>,
    pub variants: bool,
    /// Show the full compiler of each spec, one spec per line
    pub show_full_compiler: bool,
    /// Show a header even for a group with no known arch or compiler
    pub all_headers: bool,
    /// In short mode, show at most this many specs per group
    pub elide: Option<usize>,
    pub indent: usize,
    pub color: ColorChoice,
    /// Line width used for headers and columns
    pub width: usize,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Short,
            hashes: None,
            variants: false,
            show_full_compiler: false,
            all_headers: false,
            elide: None,
            indent: 0,
            color: ColorChoice::Auto,
            width: 80,
        }
    }
}

impl DisplayOptions {
    fn styles(&self) -> Styles {
        let enabled = match self.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => Term::stdout().features().colors_supported(),
        };
        Styles {
            header: Style::new().blue().bold().force_styling(enabled),
            hash: Style::new().dim().force_styling(enabled),
        }
    }

    fn node_format(&self, with_compiler: bool) -> String {
        let mut fmt = String::from("$_$@");
        if with_compiler {
            fmt.push_str("$%@");
        }
        if self.variants {
            fmt.push_str("$+");
        }
        fmt
    }
}

struct Styles {
    header: Style,
    hash: Style,
}

/// Install prefix of a spec relative to the install root
///
/// # Errors
///
/// Never fails for a concrete spec; the error comes from the shared
/// formatter.
pub fn install_prefix(spec: &ConcreteSpec) -> Result<String, FormatError> {
    spec.format(INSTALL_LAYOUT)
}

/// Render specs grouped by architecture and compiler
///
/// Groups appear in sorted order, each under a `-- arch / compiler ---`
/// header, with the specs inside sorted by name, version and hash.
///
/// # Errors
///
/// Returns a `FormatError` if a node cannot be rendered.
pub fn display_specs(specs: &[Arc<ConcreteSpec>], opts: &DisplayOptions) -> Result<String, FormatError> {
    let mut groups: BTreeMap<(&Arch, &Compiler), Vec<&ConcreteSpec>> = BTreeMap::new();
    for spec in specs {
        let root = &spec.root().data;
        groups
            .entry((&root.arch, &root.compiler))
            .or_default()
            .push(spec);
    }

    let styles = opts.styles();
    let mut out = String::new();
    for (i, ((arch, compiler), mut members)) in groups.into_iter().enumerate() {
        members.sort_by(|a, b| {
            let (ra, rb) = (&a.root().data, &b.root().data);
            (&ra.name, &ra.version, a.hash()).cmp(&(&rb.name, &rb.version, b.hash()))
        });
        members.dedup_by_key(|spec| spec.hash());

        if i > 0 {
            out.push('\n');
        }
        if opts.all_headers || !is_unknown(arch, compiler) {
            let line = header(arch, compiler, opts.width.saturating_sub(opts.indent));
            out.push_str(&" ".repeat(opts.indent));
            out.push_str(&format!("{}\n", styles.header.apply_to(line)));
        }
        match opts.mode {
            DisplayMode::Short => short(&mut out, &members, opts, &styles)?,
            DisplayMode::Paths => paths(&mut out, &members, opts, &styles)?,
            DisplayMode::Deps => deps(&mut out, &members, opts)?,
        }
    }
    Ok(out)
}

/// Shorten a long list to `max` entries plus a `...` marker before the last
///
/// `elide_list(&[1, 2, 3, 4, 5, 6], 4)` keeps `1, 2, 3, ..., 6`.
#[must_use]
pub fn elide_list(lines: &[String], max: usize) -> Vec<String> {
    let max = max.max(1);
    if lines.len() <= max {
        return lines.to_vec();
    }
    let mut kept = lines[..max - 1].to_vec();
    kept.push("...".to_string());
    kept.extend(lines.last().cloned());
    kept
}

/// A group built without an architecture or compiler
fn is_unknown(arch: &Arch, compiler: &Compiler) -> bool {
    arch.platform.is_empty() && arch.os.is_empty() && arch.target.is_empty() && compiler.name.is_empty()
}

fn header(arch: &Arch, compiler: &Compiler, width: usize) -> String {
    let mut line = if is_unknown(arch, compiler) {
        "-- no arch / no compiler ".to_string()
    } else {
        format!("-- {arch} / {compiler} ")
    };
    let fill = width.saturating_sub(line.len()).max(2);
    line.extend(std::iter::repeat_n('-', fill));
    line
}

fn label(spec: &ConcreteSpec, opts: &DisplayOptions, styles: &Styles) -> Result<String, FormatError> {
    let text = spec.format(&opts.node_format(opts.show_full_compiler))?;
    Ok(match opts.hashes {
        Some(len) => format!("{} {text}", styles.hash.apply_to(spec.dag_hash(Some(len)))),
        None => text,
    })
}

fn short(
    out: &mut String,
    members: &[&ConcreteSpec],
    opts: &DisplayOptions,
    styles: &Styles,
) -> Result<(), FormatError> {
    let mut cells = members
        .iter()
        .map(|spec| label(spec, opts, styles))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(max) = opts.elide {
        cells = elide_list(&cells, max);
    }

    if opts.show_full_compiler {
        for cell in cells {
            out.push_str(&format!("{}{cell}\n", " ".repeat(opts.indent)));
        }
    } else {
        out.push_str(&columnize(&cells, opts.width, opts.indent));
    }
    Ok(())
}

/// Lay cells out column by column in as many columns as fit
fn columnize(cells: &[String], width: usize, indent: usize) -> String {
    if cells.is_empty() {
        return String::new();
    }
    let widest = cells.iter().map(|c| measure_text_width(c)).max().unwrap_or(0);
    let column = widest + 2;
    let columns = (width.saturating_sub(indent) / column).clamp(1, cells.len());
    let rows = cells.len().div_ceil(columns);

    let mut out = String::new();
    for row in 0..rows {
        let mut line = " ".repeat(indent);
        for col in 0..columns {
            let Some(cell) = cells.get(col * rows + row) else {
                break;
            };
            line.push_str(cell);
            line.extend(std::iter::repeat_n(' ', column - measure_text_width(cell)));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn paths(
    out: &mut String,
    members: &[&ConcreteSpec],
    opts: &DisplayOptions,
    styles: &Styles,
) -> Result<(), FormatError> {
    let mut rows = Vec::with_capacity(members.len());
    for spec in members {
        rows.push((label(spec, opts, styles)?, install_prefix(spec)?));
    }
    let widest = rows.iter().map(|(l, _)| measure_text_width(l)).max().unwrap_or(0);
    for (label, prefix) in rows {
        let pad = widest - measure_text_width(&label) + 2;
        out.push_str(&format!("{}{label}{}{prefix}\n", " ".repeat(opts.indent), " ".repeat(pad)));
    }
    Ok(())
}

fn deps(out: &mut String, members: &[&ConcreteSpec], opts: &DisplayOptions) -> Result<(), FormatError> {
    let tree_opts = TreeOptions {
        format: opts.node_format(true),
        hash_len: opts.hashes,
        indent: opts.indent,
    };
    for spec in members {
        out.push_str(&tree(spec, &tree_opts)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fills_width() {
        let arch = Arch::new("linux", "centos7", "x86_64");
        let compiler = Compiler::new("gcc", "12.2.0".parse().unwrap());
        let line = header(&arch, &compiler, 80);
        assert!(line.starts_with("-- linux-centos7-x86_64 / gcc@12.2.0 ---"));
        assert_eq!(line.len(), 80);
    }

    #[test]
    fn test_long_header_keeps_dashes() {
        let arch = Arch::new("linux", "centos7", "x86_64");
        let compiler = Compiler::new("gcc", "12.2.0".parse().unwrap());
        assert!(header(&arch, &compiler, 10).ends_with(" --"));
    }

    #[test]
    fn test_columnize_fills_columns_first() {
        let cells: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(ToString::to_string).collect();
        // Three columns of width 3 fit in 10
        assert_eq!(columnize(&cells, 10, 0), "a  c  e\nb  d\n");
        assert_eq!(columnize(&cells, 11, 2), "  a  c  e\n  b  d\n");
    }

    #[test]
    fn test_unknown_group_header() {
        let arch = Arch::new("", "", "");
        let compiler = Compiler::new("", "1".parse().unwrap());
        assert!(is_unknown(&arch, &compiler));
        assert!(header(&arch, &compiler, 40).starts_with("-- no arch / no compiler ---"));
    }

    #[test]
    fn test_elide_list_keeps_last() {
        let lines: Vec<String> = (1..=6).map(|n| n.to_string()).collect();
        assert_eq!(elide_list(&lines, 4), ["1", "2", "3", "...", "6"]);
        assert_eq!(elide_list(&lines, 6), lines);
        assert_eq!(elide_list(&lines[..1], 0), ["1"]);
    }

    #[test]
    fn test_columnize_narrow_width_uses_one_column() {
        let cells = vec!["zlib@1.2.13".to_string(), "cmake@3.27.0".to_string()];
        assert_eq!(columnize(&cells, 5, 0), "zlib@1.2.13\ncmake@3.27.0\n");
        assert_eq!(columnize(&[], 80, 0), "");
    }
}
