// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { db }) => commands::cmd_init(&db.db_path),

        Some(Commands::Copy {
            sources,
            db,
            engine,
            distribution,
            from_archive,
            to_archive,
            from_series,
            to_series,
            from_pocket,
            to_pocket,
            include_binaries,
            unembargo,
            person,
            sponsored,
            component,
            section,
            dry_run,
        }) => commands::cmd_copy(commands::CopyArgs {
            sources,
            db_path: db.db_path,
            config: engine.config,
            store_root: engine.store_root,
            distribution,
            from_archive,
            to_archive,
            from_series,
            to_series,
            from_pocket,
            to_pocket,
            include_binaries,
            unembargo,
            person,
            sponsored,
            component,
            section,
            dry_run,
        }),

        Some(Commands::Delete {
            ids,
            db,
            binary,
            comment,
            person,
            obsolete,
        }) => commands::cmd_delete(
            &db.db_path,
            &ids,
            binary,
            comment.as_deref(),
            person.as_deref(),
            obsolete,
        ),

        Some(Commands::Override {
            id,
            db,
            binary,
            component,
            section,
            priority,
        }) => commands::cmd_override(&db.db_path, id, binary, component, section, priority.as_deref()),

        Some(Commands::Publish {
            db,
            archive,
            show_pool,
        }) => commands::cmd_publish(&db.db_path, &archive, show_pool),

        Some(Commands::Dominate {
            db,
            archive,
            series,
            pocket,
            format,
        }) => commands::cmd_dominate(&db.db_path, &archive, &series, &pocket, &format),

        Some(Commands::BuildStatus {
            db,
            archive,
            name,
            format,
        }) => commands::cmd_build_status(&db.db_path, &archive, name.as_deref(), &format),

        Some(Commands::List {
            db,
            archive,
            name,
            status,
            binaries,
        }) => commands::cmd_list(
            &db.db_path,
            &archive,
            name.as_deref(),
            status.as_deref(),
            binaries,
        ),

        Some(Commands::ReleaseDelayed {
            db,
            engine,
            archive,
        }) => commands::cmd_release_delayed(
            &db.db_path,
            &engine.config,
            &engine.store_root,
            &archive.distribution,
            &archive.archive,
        ),

        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
