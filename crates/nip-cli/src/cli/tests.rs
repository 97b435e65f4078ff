//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn cli_parse_batch() {
    match parse(&[
        "nip",
        "batch",
        "--manifest",
        "items.txt",
        "--category",
        "notes",
    ]) {
        CliCommand::Batch {
            manifest,
            category,
            endpoints,
            dest_dir,
            json_key,
        } => {
            assert_eq!(manifest, Path::new("items.txt"));
            assert_eq!(category, "notes");
            assert!(endpoints.is_empty());
            assert_eq!(dest_dir, Path::new("."));
            assert!(json_key.is_none());
        }
        _ => panic!("expected Batch"),
    }
}

#[test]
fn cli_parse_batch_endpoints_in_order() {
    match parse(&[
        "nip",
        "batch",
        "--manifest",
        "items.txt",
        "--category",
        "notes",
        "--endpoint",
        "https://a.example/api",
        "--endpoint",
        "https://b.example/api",
        "--dest-dir",
        "/tmp/notes",
        "--json-key",
        "id",
    ]) {
        CliCommand::Batch {
            endpoints,
            dest_dir,
            json_key,
            ..
        } => {
            assert_eq!(endpoints, ["https://a.example/api", "https://b.example/api"]);
            assert_eq!(dest_dir, Path::new("/tmp/notes"));
            assert_eq!(json_key.as_deref(), Some("id"));
        }
        _ => panic!("expected Batch with endpoints"),
    }
}

#[test]
fn cli_parse_batch_requires_manifest_and_category() {
    assert!(Cli::try_parse_from(["nip", "batch", "--manifest", "items.txt"]).is_err());
    assert!(Cli::try_parse_from(["nip", "batch", "--category", "notes"]).is_err());
}

#[test]
fn cli_parse_dump() {
    match parse(&["nip", "dump", "--out", "notes.xml"]) {
        CliCommand::Dump {
            out,
            endpoints,
            sha256,
            parts,
            partition_dir,
        } => {
            assert_eq!(out, Path::new("notes.xml"));
            assert!(endpoints.is_empty());
            assert!(sha256.is_none());
            assert!(parts.is_none());
            assert!(partition_dir.is_none());
        }
        _ => panic!("expected Dump"),
    }
}

#[test]
fn cli_parse_dump_with_split() {
    match parse(&[
        "nip",
        "dump",
        "--out",
        "notes.xml",
        "--sha256",
        "ab12",
        "--parts",
        "8",
        "--partition-dir",
        "/tmp/parts",
    ]) {
        CliCommand::Dump {
            sha256,
            parts,
            partition_dir,
            ..
        } => {
            assert_eq!(sha256.as_deref(), Some("ab12"));
            assert_eq!(parts, Some(8));
            assert_eq!(partition_dir.as_deref(), Some(Path::new("/tmp/parts")));
        }
        _ => panic!("expected Dump with --parts"),
    }
}

#[test]
fn cli_parse_dump_partition_dir_requires_parts() {
    assert!(Cli::try_parse_from([
        "nip",
        "dump",
        "--out",
        "notes.xml",
        "--partition-dir",
        "/tmp/parts",
    ])
    .is_err());
}

#[test]
fn cli_parse_partition_by_parts() {
    match parse(&[
        "nip",
        "partition",
        "--input",
        "notes.xml",
        "--out-dir",
        "parts",
        "--parts",
        "4",
    ]) {
        CliCommand::Partition {
            input,
            out_dir,
            parts,
            max_part_bytes,
        } => {
            assert_eq!(input, Path::new("notes.xml"));
            assert_eq!(out_dir, Path::new("parts"));
            assert_eq!(parts, Some(4));
            assert!(max_part_bytes.is_none());
        }
        _ => panic!("expected Partition"),
    }
}

#[test]
fn cli_parse_partition_by_max_bytes() {
    match parse(&[
        "nip",
        "partition",
        "--input",
        "notes.xml",
        "--out-dir",
        "parts",
        "--max-part-bytes",
        "1048576",
    ]) {
        CliCommand::Partition {
            parts,
            max_part_bytes,
            ..
        } => {
            assert!(parts.is_none());
            assert_eq!(max_part_bytes, Some(1_048_576));
        }
        _ => panic!("expected Partition with --max-part-bytes"),
    }
}

#[test]
fn cli_parse_partition_sizing_is_exclusive() {
    assert!(Cli::try_parse_from([
        "nip",
        "partition",
        "--input",
        "notes.xml",
        "--out-dir",
        "parts",
    ])
    .is_err());
    assert!(Cli::try_parse_from([
        "nip",
        "partition",
        "--input",
        "notes.xml",
        "--out-dir",
        "parts",
        "--parts",
        "4",
        "--max-part-bytes",
        "1024",
    ])
    .is_err());
}

#[test]
fn cli_parse_repair() {
    match parse(&["nip", "repair", "--input", "broken.xml", "--output", "fixed.xml"]) {
        CliCommand::Repair { input, output } => {
            assert_eq!(input, Path::new("broken.xml"));
            assert_eq!(output, Path::new("fixed.xml"));
        }
        _ => panic!("expected Repair"),
    }
}
