//! Integration tests for error types

#[cfg(test)]
mod tests {
    use spackle_errors::*;

    #[test]
    fn test_error_conversion() {
        let err: Error = NormalizeError::UnknownPackage {
            name: "libelf".into(),
            path: SpecPath::root("mpileaks").child("libelf"),
        }
        .into();
        assert!(matches!(err, Error::Normalize(_)));
        assert_eq!(
            err.to_string(),
            "normalization error: unknown package libelf required by mpileaks -> libelf"
        );
    }

    #[test]
    fn test_rejected_providers_listed() {
        let err = ConcretizeError::NoProviderAvailable {
            capability: "mpi".into(),
            path: SpecPath::root("hdf5").child("mpi"),
            rejected: vec![
                RejectedProvider {
                    provider: "mpich".into(),
                    reason: "provides mpi@:3 but mpi@4: is required".into(),
                },
                RejectedProvider {
                    provider: "openmpi".into(),
                    reason: "conflicts with %gcc".into(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("mpich (provides mpi@:3 but mpi@4: is required); openmpi"));
        assert_eq!(err.path().leaf(), Some("mpi"));
        assert_eq!(err.user_code(), Some("concretize.no_provider"));
    }

    #[test]
    fn test_error_clone() {
        let err = ConcretizeError::StaticDependencyCycle {
            cycle: SpecPath(vec!["a".into(), "b".into(), "a".into()]),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert_eq!(cloned.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn test_parse_diagnostic_points_at_column() {
        let err = ParseError::new("unexpected '@'", "zlib@@1.2", 5);
        assert_eq!(err.diagnostic(), "unexpected '@'\nzlib@@1.2\n     ^");
        let err: Error = err.into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_hash_mismatch_names_package() {
        let err: Error = HashError::Mismatch {
            package: "zlib".into(),
            stored: "aaaa".into(),
            computed: "bbbb".into(),
        }
        .into();
        assert!(err.to_string().contains("stored hash aaaa of zlib does not match its contents (bbbb)"));
        assert_eq!(err.user_code(), Some("hash.mismatch"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(
            err,
            Error::Io {
                kind: std::io::ErrorKind::PermissionDenied,
                path: None,
                ..
            }
        ));
        assert_eq!(err.user_code(), Some("error.io"));
    }
}
