use clap::Parser;

use super::{Cli, Commands};

fn parse(args: &[&str]) -> Cli {
    Cli::parse_from(args)
}

#[test]
fn add_parses_body_and_tags() {
    let cli = parse(&["tdk", "add", "water the plants", "-g", "garden", "--tag", "home"]);
    match cli.command {
        Commands::Add(args) => {
            assert_eq!(args.body, "water the plants");
            assert_eq!(args.tags, vec!["garden".to_string(), "home".to_string()]);
        }
        other => panic!("expected Add, got {:?}", other),
    }
}

#[test]
fn import_parses_multiple_paths() {
    let cli = parse(&["tdk", "import", "a.json", "b.eml"]);
    match cli.command {
        Commands::Import(args) => {
            assert_eq!(args.paths.len(), 2);
            assert!(args.dir.is_none());
        }
        other => panic!("expected Import, got {:?}", other),
    }
}

#[test]
fn import_parses_directory_mode() {
    let cli = parse(&["tdk", "import", "-d", "inbox"]);
    match cli.command {
        Commands::Import(args) => {
            assert!(args.paths.is_empty());
            assert_eq!(args.dir.as_deref(), Some(std::path::Path::new("inbox")));
        }
        other => panic!("expected Import, got {:?}", other),
    }
}

#[test]
fn import_requires_paths_or_directory() {
    assert!(Cli::try_parse_from(["tdk", "import"]).is_err());
}

#[test]
fn import_rejects_paths_combined_with_directory() {
    assert!(Cli::try_parse_from(["tdk", "import", "a.json", "-d", "inbox"]).is_err());
}

#[test]
fn ingest_parses_like_import() {
    let cli = parse(&["tdk", "ingest", "-d", "inbox"]);
    match cli.command {
        Commands::Ingest(args) => {
            assert_eq!(args.dir.as_deref(), Some(std::path::Path::new("inbox")));
        }
        other => panic!("expected Ingest, got {:?}", other),
    }
}

#[test]
fn edit_parses_with_id() {
    let cli = parse(&["tdk", "edit", "01arz3ndektsv4rrffq69g5fav"]);
    match cli.command {
        Commands::Edit(args) => {
            assert_eq!(args.id, "01arz3ndektsv4rrffq69g5fav");
        }
        other => panic!("expected Edit, got {:?}", other),
    }
}

#[test]
fn export_parses_with_format() {
    let cli = parse(&["tdk", "export", "ndjson"]);
    match cli.command {
        Commands::Export(args) => {
            assert_eq!(args.format, "ndjson");
        }
        other => panic!("expected Export, got {:?}", other),
    }
}

#[test]
fn backup_parses() {
    let cli = parse(&["tdk", "backup"]);
    assert!(matches!(cli.command, Commands::Backup));
}

#[test]
fn global_data_dir_flag_parses() {
    let cli = parse(&["tdk", "-D", "/tmp/deck", "-n", "work.db", "backup"]);
    assert_eq!(cli.data_dir.as_deref(), Some(std::path::Path::new("/tmp/deck")));
    assert_eq!(cli.db_name.as_deref(), Some("work.db"));
}
