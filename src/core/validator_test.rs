use super::model::FileDescriptor;
use super::validator::{RejectReason, ValidationPolicy};
use std::path::PathBuf;

fn file(mime: &str, size: u64) -> FileDescriptor {
    FileDescriptor {
        display_name: "front.jpg".to_string(),
        path: PathBuf::from("/tmp/front.jpg"),
        size,
        mime: mime.to_string(),
    }
}

fn policy() -> ValidationPolicy {
    ValidationPolicy {
        accepted_mime_prefixes: vec!["image/".to_string()],
        max_bytes: 1024,
    }
}

#[test]
fn accepts_an_image_within_the_limit() {
    assert!(policy().validate(&file("image/jpeg", 512)).is_ok());
}

#[test]
fn rejects_unsupported_mime() {
    let err = policy().validate(&file("application/pdf", 10)).unwrap_err();
    assert_eq!(err, RejectReason::UnsupportedType("application/pdf".to_string()));
}

#[test]
fn rejects_oversized_file() {
    let err = policy().validate(&file("image/png", 4096)).unwrap_err();
    assert_eq!(err, RejectReason::TooLarge { size: 4096, limit: 1024 });
}

#[test]
fn mime_check_runs_before_the_size_check() {
    // both checks fail; the first one determines the reason
    let err = policy().validate(&file("video/mp4", 4096)).unwrap_err();
    assert!(matches!(err, RejectReason::UnsupportedType(_)));
}

#[test]
fn multiple_prefixes_are_honored() {
    let policy = ValidationPolicy {
        accepted_mime_prefixes: vec!["image/".to_string(), "video/".to_string()],
        max_bytes: 1024,
    };
    assert!(policy.validate(&file("video/mp4", 100)).is_ok());
}

#[test]
fn boundary_size_is_accepted() {
    assert!(policy().validate(&file("image/jpeg", 1024)).is_ok());
}
