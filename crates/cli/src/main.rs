// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use marketsync_config::{Config, ConfigManager};
use std::path::PathBuf;

mod commands;

use commands::Session;

fn build_cli() -> Command {
    Command::new("marketsync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Queue marketplace changes offline and sync them when the network returns")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("DIR")
                .help("Config directory (defaults to the platform config dir)")
                .global(true),
        )
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_name("PATH")
                .help("Path to the queue database, overriding [storage]")
                .global(true),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .help("Skip the connectivity probe and treat the network as down")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("enqueue")
                .about("Queue a mutation against a remote table")
                .arg(Arg::new("table").required(true).value_name("TABLE").help("Remote table name"))
                .arg(
                    Arg::new("action")
                        .required(true)
                        .value_name("ACTION")
                        .value_parser(["create", "update", "delete"])
                        .help("Kind of mutation"),
                )
                .arg(
                    Arg::new("payload")
                        .required(true)
                        .value_name("JSON")
                        .help("Record as a JSON object; update and delete need an \"id\""),
                ),
        )
        .subcommand(Command::new("sync").about("Replay queued mutations against the remote API"))
        .subcommand(
            Command::new("status")
                .about("Show connectivity, queue size and last sync time")
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("list")
                .about("List queued mutations in replay order")
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("clear")
                .about("Discard every queued mutation")
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help("Skip confirmation prompt")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Inspect or create the config file")
                .subcommand_required(true)
                .subcommand(Command::new("init").about("Write a default config file"))
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("path").about("Print the config file location")),
        )
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Print as JSON")
        .action(ArgAction::SetTrue)
}

fn config_manager(matches: &ArgMatches) -> Result<ConfigManager> {
    let manager = match matches.get_one::<String>("config") {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
        None => ConfigManager::new(),
    };
    manager.context("Failed to locate config directory")
}

fn init_logging(config: &Config) {
    let default_filter = config.app.log_level.to_string();
    // Tolerate a second init in the same process
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let manager = config_manager(&matches)?;
    let config = manager
        .load_with_env_overrides()
        .context("Failed to load config")?;
    init_logging(&config);

    let db_path = matches
        .get_one::<String>("database")
        .map(PathBuf::from)
        .unwrap_or_else(|| manager.database_path(&config));
    let offline = matches.get_flag("offline");

    match matches.subcommand() {
        Some(("config", sub_matches)) => match sub_matches.subcommand() {
            Some(("init", _)) => commands::config_init(&manager),
            Some(("show", _)) => commands::config_show(&config, &db_path),
            Some(("path", _)) => commands::config_path(&manager),
            _ => {
                build_cli().print_help()?;
                Ok(())
            }
        },
        Some((name, sub_matches)) => {
            let session = Session::open(&config, &db_path, offline)
                .await
                .context("Failed to start sync session")?;
            let result = run(&session, name, sub_matches).await;
            session.close().await;
            result
        }
        None => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

async fn run(session: &Session, name: &str, matches: &ArgMatches) -> Result<()> {
    match name {
        "enqueue" => {
            let table = required(matches, "table")?;
            let action = required(matches, "action")?;
            let payload = required(matches, "payload")?;
            commands::enqueue(session, table, action, payload).await?;
        }
        "sync" => {
            commands::sync(session).await?;
        }
        "status" => {
            commands::status(session, matches.get_flag("json"))?;
        }
        "list" => {
            commands::list(session, matches.get_flag("json")).await?;
        }
        "clear" => {
            commands::clear(session, matches.get_flag("force")).await?;
        }
        other => anyhow::bail!("Unknown command: {}", other),
    }
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow::anyhow!("{} is required", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_enqueue_arguments() {
        let matches = build_cli()
            .try_get_matches_from([
                "marketsync",
                "--offline",
                "enqueue",
                "orders",
                "update",
                r#"{"id": "42"}"#,
            ])
            .unwrap();

        assert!(matches.get_flag("offline"));
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "enqueue");
        assert_eq!(required(sub, "table").unwrap(), "orders");
        assert_eq!(required(sub, "action").unwrap(), "update");
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result =
            build_cli().try_get_matches_from(["marketsync", "enqueue", "orders", "upsert", "{}"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from(["marketsync", "status", "--database", "/tmp/q.db", "--json"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(
            sub.get_one::<String>("database").map(String::as_str),
            Some("/tmp/q.db")
        );
        assert!(sub.get_flag("json"));
    }

    #[test]
    fn test_config_requires_subcommand() {
        assert!(build_cli()
            .try_get_matches_from(["marketsync", "config"])
            .is_err());
    }
}
