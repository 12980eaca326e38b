mod app;
mod cli;
mod config;
mod db;
mod domain;
mod edit;
mod export;
mod imports;
mod task_id;
mod timestamp;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), app::AppError> {
    use clap::Parser;
    use cli::Commands;

    let cli = cli::Cli::parse();
    let ctx = config::Context::resolve(cli.data_dir, cli.db_name)?;
    let app = app::App::open(ctx)?;

    match cli.command {
        Commands::Add(args) => {
            let outcome = app.add(&args.body, &args.tags)?;
            println!("created {}", outcome.task_id);
            print_warnings(&outcome.warnings);
        }
        Commands::Import(args) => {
            let outcomes = match args.dir {
                Some(dir) => app.import_directory(&dir)?,
                None => {
                    let mut outcomes = Vec::new();
                    for path in &args.paths {
                        outcomes.push(app.import_file(path)?);
                    }
                    outcomes
                }
            };
            for outcome in &outcomes {
                println!("imported {} from {}", outcome.task_id, outcome.source);
                print_warnings(&outcome.warnings);
            }
        }
        Commands::Ingest(args) => {
            let mut editor = edit::ExternalEditor;
            let outcomes = match args.dir {
                Some(dir) => app.ingest_directory(&dir, &mut editor)?,
                None => {
                    let mut outcomes = Vec::new();
                    for path in &args.paths {
                        outcomes.push(app.ingest_file(path, &mut editor)?);
                    }
                    outcomes
                }
            };
            for outcome in &outcomes {
                println!("ingested {} from {}", outcome.task_id, outcome.source);
                print_warnings(&outcome.warnings);
            }
        }
        Commands::Edit(args) => {
            let mut editor = edit::ExternalEditor;
            match app.edit_task(&args.id, &mut editor)? {
                app::EditReport::Unchanged => println!("no changes made to {}", args.id),
                app::EditReport::Updated { warnings } => {
                    println!("updated {}", args.id);
                    print_warnings(&warnings);
                }
            }
        }
        Commands::Export(args) => {
            let format: export::ExportFormat = args.format.parse()?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            app.export(format, &mut out)?;
        }
        Commands::Backup => {
            let target = app.backup()?;
            println!("backup written to {}", target.display());
        }
    }

    Ok(())
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}
