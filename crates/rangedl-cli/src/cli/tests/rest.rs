//! Tests for status, pause, resume, retry, remove, verify and global flags.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use rangedl_core::checksum::HashAlgorithm;

#[test]
fn cli_parse_status() {
    assert!(matches!(parse(&["rangedl", "status"]), CliCommand::Status));
}

#[test]
fn cli_parse_pause_resume_retry() {
    assert!(matches!(parse(&["rangedl", "pause", "3"]), CliCommand::Pause { id: 3 }));
    assert!(matches!(parse(&["rangedl", "resume", "4"]), CliCommand::Resume { id: 4 }));
    assert!(matches!(parse(&["rangedl", "retry", "5"]), CliCommand::Retry { id: 5 }));
}

#[test]
fn cli_rejects_non_numeric_id() {
    assert!(Cli::try_parse_from(["rangedl", "pause", "abc"]).is_err());
}

#[test]
fn cli_parse_remove() {
    match parse(&["rangedl", "remove", "7", "--delete-file"]) {
        CliCommand::Remove { id, delete_file } => {
            assert_eq!(id, 7);
            assert!(delete_file);
        }
        _ => panic!("expected Remove"),
    }
}

#[test]
fn cli_parse_verify_without_expectations() {
    match parse(&["rangedl", "verify", "/tmp/f.iso"]) {
        CliCommand::Verify { path, expected } => {
            assert_eq!(path, std::path::PathBuf::from("/tmp/f.iso"));
            assert!(expected.is_empty());
        }
        _ => panic!("expected Verify"),
    }
}

#[test]
fn cli_parse_verify_expectations() {
    match parse(&[
        "rangedl",
        "verify",
        "f.bin",
        "--expect",
        "sha256:AA",
        "--expect",
        "MD5:bb",
    ]) {
        CliCommand::Verify { expected, .. } => {
            assert_eq!(
                expected,
                vec![
                    (HashAlgorithm::Sha256, "AA".to_string()),
                    (HashAlgorithm::Md5, "bb".to_string()),
                ]
            );
        }
        _ => panic!("expected Verify"),
    }
}

#[test]
fn cli_rejects_unknown_algorithm() {
    assert!(Cli::try_parse_from(["rangedl", "verify", "f", "--expect", "crc32:00"]).is_err());
}

#[test]
fn cli_global_paths() {
    let cli = Cli::try_parse_from(["rangedl", "status", "--db", "/tmp/j.db", "--config", "/tmp/c.toml"]).unwrap();
    assert_eq!(cli.db, Some(std::path::PathBuf::from("/tmp/j.db")));
    assert_eq!(cli.config, Some(std::path::PathBuf::from("/tmp/c.toml")));
}
