//! Integration tests for repository crate

#[cfg(test)]
mod tests {
    use spackle_errors::{Error, RecipeError};
    use spackle_repository::*;
    use spackle_types::{Arch, Compiler, VariantValue, Version};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    const ROOT: &str = r#"
name = "root"
description = "CERN ROOT data analysis framework"
versions = ["6.14.04", "6.16.00"]

[[variants]]
name = "cxxstd"
default = "11"
values = ["11", "14", "17"]

[[depends_on]]
spec = "zlib"

[[conflicts]]
spec = "%gcc@:4"
when = "cxxstd=17"
msg = "C++17 needs a newer gcc"
"#;

    const ZLIB: &str = r#"
name = "zlib"
versions = ["1.2.11"]
"#;

    const OPENBLAS: &str = r#"
name = "openblas"
versions = ["0.3.21"]

[[provides]]
spec = "blas"
"#;

    #[tokio::test]
    async fn test_load_dir() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("root.toml"), ROOT).await.unwrap();
        tokio::fs::write(dir.path().join("zlib.toml"), ZLIB).await.unwrap();
        tokio::fs::write(dir.path().join("openblas.toml"), OPENBLAS)
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("README.md"), "ignored")
            .await
            .unwrap();

        let repo = InMemoryRepository::load_dir(dir.path()).await.unwrap();
        assert_eq!(repo.names().collect::<Vec<_>>(), ["openblas", "root", "zlib"]);
        assert!(repo.is_virtual("blas"));
        assert_eq!(repo.providers_of("blas")[0].package, "openblas");
        assert_eq!(repo.dependency_rules("root").unwrap()[0].name(), "zlib");
    }

    #[tokio::test]
    async fn test_conflicts_through_provider() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("root.toml"), ROOT).await.unwrap();
        let repo = InMemoryRepository::load_dir(dir.path()).await.unwrap();

        let arch = Arch::new("linux", "centos7", "x86_64");
        let variants = BTreeMap::from([("cxxstd".to_string(), VariantValue::single("17"))]);
        let old_gcc = Compiler::new("gcc", Version::parse("4.8.5").unwrap());
        let new_gcc = Compiler::new("gcc", Version::parse("9.4.0").unwrap());
        let version = Version::parse("6.16.00").unwrap();

        assert_eq!(
            repo.conflicts("root", &version, &variants, &old_gcc, &arch)
                .as_deref(),
            Some("C++17 needs a newer gcc")
        );
        assert_eq!(repo.conflicts("root", &version, &variants, &new_gcc, &arch), None);
        assert_eq!(repo.conflicts("nope", &version, &variants, &new_gcc, &arch), None);
    }

    #[tokio::test]
    async fn test_duplicate_files() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.toml"), ZLIB).await.unwrap();
        tokio::fs::write(dir.path().join("b.toml"), ZLIB).await.unwrap();
        let err = InMemoryRepository::load_dir(dir.path()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Recipe(RecipeError::DuplicatePackage { ref name }) if name == "zlib"
        ));
    }

    #[tokio::test]
    async fn test_invalid_file_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        tokio::fs::write(&path, "name = ").await.unwrap();
        let err = PackageRecipe::load_file(&path).await.unwrap_err();
        match err {
            Error::Recipe(RecipeError::InvalidRecipe { package, .. }) => {
                assert!(package.ends_with("broken.toml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_dir() {
        let dir = tempdir().unwrap();
        let err = InMemoryRepository::load_dir(&dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { path: Some(_), .. }));
    }
}
