//! Integration tests for query crate

#[cfg(test)]
mod tests {
    use spackle_errors::{Error, QueryError};
    use spackle_query::*;
    use spackle_spec::{ConcreteSpec, ConcreteSpecBuilder, NodeData, Spec};
    use spackle_types::{Arch, ColorChoice, Compiler, DepTypes, Version};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn build(name: &str, version: &str, compiler: &str, deps: &[(&str, &str)]) -> Arc<ConcreteSpec> {
        let (cname, cversion) = compiler.split_once('@').unwrap();
        let data = |name: &str, version: &str| NodeData {
            name: name.to_string(),
            version: Version::parse(version).unwrap(),
            variants: BTreeMap::new(),
            compiler: Compiler::new(cname, Version::parse(cversion).unwrap()),
            arch: Arch::new("linux", "centos7", "x86_64"),
        };

        let mut b = ConcreteSpecBuilder::new();
        let children: Vec<_> = deps
            .iter()
            .map(|&(n, v)| (b.add_node(data(n, v), vec![]).unwrap(), DepTypes::LINK))
            .collect();
        let root = b.add_node(data(name, version), children).unwrap();
        Arc::new(b.finish(root).unwrap())
    }

    fn database() -> InMemoryDatabase {
        let db = InMemoryDatabase::new();
        db.add(build("foo", "1.0", "gcc@9.4.0", &[("zlib", "1.2.11")]));
        db.add(build("foo", "2.0", "gcc@9.4.0", &[("zlib", "1.2.13")]));
        db.add(build("zlib", "1.2.13", "gcc@12.2.0", &[]));
        db
    }

    fn query(text: &str) -> Spec {
        Spec::parse(text).unwrap()
    }

    #[test]
    fn test_ambiguous_query_lists_every_match() {
        let db = database();
        let found = db.query(&query("foo"));
        assert_eq!(found.len(), 2);

        let err = disambiguate(&query("foo"), found.iter().map(AsRef::as_ref)).unwrap_err();
        let Error::Query(QueryError::Ambiguous { matches, .. }) = err else {
            panic!("expected ambiguity, got {err}");
        };
        assert_eq!(matches.len(), 2);
        assert!(matches[0].ends_with(" foo@1.0%gcc@9.4.0 arch=linux-centos7-x86_64"));
        assert!(matches[1].ends_with(" foo@2.0%gcc@9.4.0 arch=linux-centos7-x86_64"));
        let prefix = matches[0].split(' ').next().unwrap();
        assert!(prefix.len() >= 7);
        assert!(found[0].dag_hash(None).starts_with(prefix));
    }

    #[test]
    fn test_specific_query_selects_one() {
        let db = database();
        let found = db.query(&query("foo@1.0"));
        let spec = disambiguate(&query("foo@1.0"), found.iter().map(AsRef::as_ref)).unwrap();
        assert_eq!(spec.root().data.version.to_string(), "1.0");

        let spec = db.find_one(&query("foo ^zlib@1.2.13")).unwrap();
        assert_eq!(spec.root().data.version.to_string(), "2.0");
    }

    #[test]
    fn test_unknown_query_is_not_found() {
        let db = database();
        let err = db.find_one(&query("bar")).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::NoMatch { ref query }) if query == "bar"));
    }

    #[test]
    fn test_hash_prefix_query() {
        let db = database();
        let target = db.query(&query("foo@2.0")).remove(0);
        let text = format!("foo/{}", target.dag_hash(Some(9)));
        let found = db.find_one(&query(&text)).unwrap();
        assert_eq!(found.hash(), target.hash());
        assert!(Arc::ptr_eq(&db.get(&target.hash()).unwrap(), &target));
    }

    #[test]
    fn test_duplicates_count_once() {
        let spec = build("foo", "1.0", "gcc@9.4.0", &[]);
        let copy = Arc::new(spec.as_ref().clone());
        let chosen = disambiguate(&query("foo"), [spec.as_ref(), copy.as_ref()]).unwrap();
        assert_eq!(chosen.hash(), spec.hash());

        let db = InMemoryDatabase::new();
        assert!(db.add(spec));
        assert!(!db.add(copy));
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_display_groups_by_arch_and_compiler() {
        let db = database();
        let opts = DisplayOptions {
            color: ColorChoice::Never,
            ..DisplayOptions::default()
        };
        let out = display_specs(&db.all(), &opts).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        // Compiler versions compare numerically, so 9.4.0 sorts first
        assert!(lines[0].starts_with("-- linux-centos7-x86_64 / gcc@9.4.0 ---"));
        assert_eq!(lines[0].len(), 80);
        assert_eq!(lines[1], "foo@1.0  foo@2.0");
        assert_eq!(lines[2], "");
        assert!(lines[3].starts_with("-- linux-centos7-x86_64 / gcc@12.2.0 ---"));
        assert_eq!(lines[4], "zlib@1.2.13");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_display_paths_and_hashes() {
        let spec = build("zlib", "1.2.13", "gcc@12.2.0", &[]);
        let opts = DisplayOptions {
            mode: DisplayMode::Paths,
            hashes: Some(7),
            color: ColorChoice::Never,
            ..DisplayOptions::default()
        };
        let out = display_specs(std::slice::from_ref(&spec), &opts).unwrap();
        let expected = format!(
            "{} zlib@1.2.13  linux-centos7-x86_64/gcc-12.2.0/zlib-1.2.13-{}",
            spec.dag_hash(Some(7)),
            spec.dag_hash(None)
        );
        assert_eq!(out.lines().nth(1), Some(expected.as_str()));
        assert_eq!(
            install_prefix(&spec).unwrap(),
            format!("linux-centos7-x86_64/gcc-12.2.0/zlib-1.2.13-{}", spec.dag_hash(None))
        );
    }

    #[test]
    fn test_display_deps_tree() {
        let spec = build("foo", "1.0", "gcc@9.4.0", &[("zlib", "1.2.11")]);
        let opts = DisplayOptions {
            mode: DisplayMode::Deps,
            indent: 2,
            color: ColorChoice::Never,
            ..DisplayOptions::default()
        };
        let out = display_specs(&[spec], &opts).unwrap();
        let lines: Vec<&str> = out.lines().skip(1).collect();
        assert_eq!(lines, vec!["  foo@1.0%gcc@9.4.0", "      ^zlib@1.2.11%gcc@9.4.0"]);
    }

    #[test]
    fn test_display_full_compiler_one_per_line() {
        let db = database();
        let opts = DisplayOptions {
            show_full_compiler: true,
            hashes: Some(7),
            color: ColorChoice::Never,
            ..DisplayOptions::default()
        };
        let out = display_specs(&db.all(), &opts).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        let foo = db.find_one(&query("foo@1.0")).unwrap();
        assert_eq!(lines[1], format!("{} foo@1.0%gcc@9.4.0", foo.dag_hash(Some(7))));
        assert!(lines[2].ends_with(" foo@2.0%gcc@9.4.0"));
        assert!(lines[5].ends_with(" zlib@1.2.13%gcc@12.2.0"));
    }

    #[test]
    fn test_display_indents_headers() {
        let spec = build("zlib", "1.2.13", "gcc@12.2.0", &[]);
        let opts = DisplayOptions {
            indent: 4,
            color: ColorChoice::Never,
            ..DisplayOptions::default()
        };
        let out = display_specs(&[spec], &opts).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("    -- linux-centos7-x86_64 / gcc@12.2.0 --"));
        assert_eq!(lines[0].len(), 80);
        assert_eq!(lines[1], "    zlib@1.2.13");
    }

    #[test]
    fn test_display_unknown_group_needs_all_headers() {
        let mut b = ConcreteSpecBuilder::new();
        let data = NodeData {
            name: "bare".to_string(),
            version: Version::parse("1.0").unwrap(),
            variants: BTreeMap::new(),
            compiler: Compiler::new("", Version::parse("0").unwrap()),
            arch: Arch::new("", "", ""),
        };
        let root = b.add_node(data, vec![]).unwrap();
        let spec = Arc::new(b.finish(root).unwrap());

        let mut opts = DisplayOptions {
            color: ColorChoice::Never,
            ..DisplayOptions::default()
        };
        let out = display_specs(std::slice::from_ref(&spec), &opts).unwrap();
        assert_eq!(out, "bare@1.0\n");

        opts.all_headers = true;
        let out = display_specs(&[spec], &opts).unwrap();
        assert!(out.starts_with("-- no arch / no compiler ---"));
        assert_eq!(out.lines().nth(1), Some("bare@1.0"));
    }

    #[test]
    fn test_display_elides_long_groups() {
        let specs: Vec<_> = (1..=5)
            .map(|minor| build("foo", &format!("1.{minor}"), "gcc@9.4.0", &[]))
            .collect();
        let opts = DisplayOptions {
            elide: Some(3),
            color: ColorChoice::Never,
            ..DisplayOptions::default()
        };
        let out = display_specs(&specs, &opts).unwrap();
        assert_eq!(out.lines().nth(1), Some("foo@1.1  foo@1.2  ...      foo@1.5"));
        assert_eq!(
            elide_list(&["a".to_string(), "b".to_string()], 3),
            ["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_display_forced_color() {
        let spec = build("zlib", "1.2.13", "gcc@12.2.0", &[]);
        let opts = DisplayOptions {
            color: ColorChoice::Always,
            ..DisplayOptions::default()
        };
        let out = display_specs(&[spec], &opts).unwrap();
        assert!(out.starts_with("\u{1b}["));
        assert!(display_specs(&[], &opts).unwrap().is_empty());
    }
}
