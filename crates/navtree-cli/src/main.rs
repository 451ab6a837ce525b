//! `navtree`: render, reorder and maintain a navigation tree snapshot

mod output;
mod session;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use navtree_core::{MoveRequest, RenderRequest, ReplayCommand};
use navtree_model::{NodeId, OpenState, PageId};
use serde::Serialize;
use session::{Session, SessionPaths};
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("navtree")
        .version(navtree_core::VERSION)
        .about("Navigation tree engine over a YAML or JSON tree snapshot")
        .subcommand_required(true)
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .short('s')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Tree snapshot (.yaml, .yml or .json); rewritten by mutating commands"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (TOML)"),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Recovery log (JSON lines), appended to by mutating commands"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .subcommand(
            Command::new("render")
                .about("Render the tree from a root node")
                .arg(Arg::new("root").long("root").help("Entry node (defaults to the configured root)"))
                .arg(user_arg())
                .arg(portals_arg())
                .arg(
                    Arg::new("open")
                        .long("open")
                        .help("Tree-state cookie value, e.g. node12,node40"),
                )
                .arg(selected_arg())
                .arg(
                    Arg::new("no-ajax")
                        .long("no-ajax")
                        .action(ArgAction::SetTrue)
                        .help("Render every level instead of emitting lazy placeholders"),
                ),
        )
        .subcommand(
            Command::new("subtree")
                .about("Render the children of a lazy placeholder's parent")
                .arg(Arg::new("parent").long("parent").required(true))
                .arg(user_arg())
                .arg(portals_arg())
                .arg(selected_arg()),
        )
        .subcommand(
            Command::new("move")
                .about("Move a node to a position among a parent's children")
                .arg(Arg::new("node").long("node").required(true))
                .arg(Arg::new("parent").long("parent").required(true))
                .arg(Arg::new("position").long("position").required(true))
                .arg(user_arg())
                .arg(portals_arg()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a node and its subtree")
                .arg(Arg::new("node").long("node").required(true)),
        )
        .subcommand(Command::new("verify").about("Check ordering keys, path caches and nested-set bounds"))
        .subcommand(Command::new("replay").about("Replay every command of the recovery log"))
}

fn user_arg() -> Arg {
    Arg::new("user")
        .long("user")
        .default_value("admin")
        .help("Acting user id")
}

fn portals_arg() -> Arg {
    Arg::new("portals")
        .long("portals")
        .help("Comma-separated portals the user may view (defaults to all)")
}

fn selected_arg() -> Arg {
    Arg::new("selected")
        .long("selected")
        .help("Page currently selected in the editor")
}

fn print<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

fn arg<'a>(args: &'a ArgMatches, name: &str) -> Option<&'a str> {
    args.get_one::<String>(name).map(String::as_str)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let matches = cli().get_matches();
    let paths = SessionPaths {
        snapshot: matches
            .get_one::<PathBuf>("snapshot")
            .cloned()
            .context("--snapshot is required")?,
        config: matches.get_one::<PathBuf>("config").cloned(),
        recovery_log: matches.get_one::<PathBuf>("log").cloned(),
    };
    let json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("render", args)) => {
            let session = Session::open(paths)?;
            let root = arg(args, "root")
                .map_or_else(|| session.tree.config().root_id.clone(), NodeId::from);
            let access = session.access(arg(args, "user").unwrap_or_default(), arg(args, "portals"));
            let mut request = RenderRequest::new(root, access)
                .with_open_state(arg(args, "open").map(OpenState::from_cookie).unwrap_or_default())
                .with_allow_ajax(!args.get_flag("no-ajax"));
            if let Some(page) = arg(args, "selected") {
                request = request.with_selected_page(PageId::from(page));
            }
            let result = session.tree.render(&request).await?;
            print(json, &result, output::outline)?;
        }
        Some(("subtree", args)) => {
            let session = Session::open(paths)?;
            let parent = NodeId::from_input(arg(args, "parent"), "parent")?;
            let access = session.access(arg(args, "user").unwrap_or_default(), arg(args, "portals"));
            let selected = arg(args, "selected").map(PageId::from);
            let result = session
                .tree
                .render_subtree(&parent, &access, selected.as_ref())
                .await?;
            print(json, &result, output::outline)?;
        }
        Some(("move", args)) => {
            let session = Session::open(paths)?;
            let access = session.access(arg(args, "user").unwrap_or_default(), arg(args, "portals"));
            let request = MoveRequest::from_raw(arg(args, "node"), arg(args, "parent"), arg(args, "position"))
                .with_access(access);
            let outcome = session.tree.try_move_node(&request).await?;
            session.save()?;
            print(json, &outcome, output::move_summary)?;
        }
        Some(("delete", args)) => {
            let session = Session::open(paths)?;
            let node = NodeId::from_input(arg(args, "node"), "node")?;
            if session.store.get(&node).is_none() {
                bail!("node {node} not found");
            }
            let external_id = session.tree.on_node_deleted(Some(node.as_str())).await;
            let removed = session.store.remove_subtree(&node);
            session.save()?;
            tracing::info!(node = %node, removed = removed.len(), "subtree deleted");
            print(json, &external_id, |id| match id {
                Some(id) => format!("deleted {} node(s); external id {}\n", removed.len(), id.0),
                None => format!("deleted {} node(s)\n", removed.len()),
            })?;
        }
        Some(("verify", _)) => {
            let session = Session::open(paths)?;
            let report = session.tree.verify().await?;
            print(json, &report, output::report)?;
            if !report.is_clean() {
                std::process::exit(1);
            }
        }
        Some(("replay", _)) => {
            if paths.recovery_log.is_none() {
                bail!("replay needs --log");
            }
            let session = Session::open(paths)?;
            session.log.verify_integrity()?;
            let commands: Vec<ReplayCommand> = session.log.entries().into_iter().map(|e| e.command).collect();
            let touched = session.tree.replay(&commands).await?;
            session.save()?;
            print(json, &touched, |n| format!("replayed {} command(s), {n} node(s) touched\n", commands.len()))?;
        }
        _ => bail!("no command given, see --help"),
    }

    Ok(())
}
