use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::{env, fs, io};
use tokio::io::{AsyncBufReadExt, BufReader};

use sharr::logging;
use sharr::{Config, Node};

///////////////////////
// Utility functions //
///////////////////////

/// Resolve the shared folder: CLI argument, then SHARR_FOLDER, then
/// ./shared. The folder must already exist.
fn resolve_folder(arg: Option<&String>) -> Result<PathBuf, Box<dyn Error>> {
	let folder = match arg {
		Some(folder) => folder.clone(),
		None => env::var("SHARR_FOLDER").unwrap_or_else(|_| "./shared".to_string()),
	};

	let meta = fs::metadata(&folder)
		.map_err(|e| format!("Cannot access shared folder {}: {}", folder, e))?;
	if !meta.is_dir() {
		return Err(format!("{} is not a directory", folder).into());
	}

	Ok(PathBuf::from(folder))
}

/// Seed peers: repeated --peer flags plus the comma-separated
/// SHARR_CLUSTER variable (for scripted deployments)
fn resolve_seeds(args: Option<clap::parser::ValuesRef<'_, String>>) -> Vec<String> {
	let mut seeds: Vec<String> = args.map(|v| v.cloned().collect()).unwrap_or_default();

	if let Ok(cluster) = env::var("SHARR_CLUSTER") {
		for addr in cluster.split(',') {
			let addr = addr.trim();
			if !addr.is_empty() {
				seeds.push(addr.to_string());
			}
		}
	}

	seeds.retain(|addr| {
		if addr.contains(':') {
			true
		} else {
			eprintln!("Ignoring seed {} (expected host:port)", addr);
			false
		}
	});

	seeds
}

//////////////////
// Command loop //
//////////////////

async fn run_console(node: &Node) -> io::Result<()> {
	let mut lines = BufReader::new(tokio::io::stdin()).lines();

	println!("Commands: list | get <name> | quit");

	loop {
		print!("> ");
		io::stdout().flush()?;

		let line = tokio::select! {
			_ = tokio::signal::ctrl_c() => return Ok(()),
			line = lines.next_line() => match line? {
				Some(line) => line,
				None => return Ok(()), // stdin closed
			},
		};

		let line = line.trim();
		if line == "quit" {
			return Ok(());
		} else if line == "list" {
			let members = node.members();
			if members.is_empty() {
				println!("No cluster members known");
			} else {
				for (i, addr) in members.iter().enumerate() {
					println!("{:3}  {}", i + 1, addr);
				}
				println!("Total: {} member(s)", members.len());
			}
		} else if let Some(name) = line.strip_prefix("get ") {
			let name = name.trim();
			if name.is_empty() {
				println!("Usage: get <name>");
			} else {
				node.request_file(name).await;
			}
		} else if !line.is_empty() {
			println!("Unknown command: {}", line);
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	logging::init_tracing();

	let matches = Command::new("sharr")
		.version("0.2.0")
		.author("Szilard Hajba <szilard@symbion.hu>")
		.about("Peer-to-peer file sharing")
		.arg(Arg::new("folder").value_name("FOLDER").help("Folder to share"))
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.help("Config file (default: ./sharr.toml)"),
		)
		.arg(
			Arg::new("peer")
				.short('p')
				.long("peer")
				.value_name("ADDR")
				.action(ArgAction::Append)
				.help("Seed peer address (host:port), repeatable"),
		)
		.get_matches();

	let folder = resolve_folder(matches.get_one::<String>("folder"))?;
	let seeds = resolve_seeds(matches.get_many::<String>("peer"));
	let config = Config::load(matches.get_one::<String>("config").map(|p| Path::new(p)))?;

	let node = Node::start(config, folder, seeds).await?;
	run_console(&node).await?;
	node.shutdown().await;

	Ok(())
}

// vim: ts=4
