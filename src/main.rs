use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use vscode_background::{
	app::{App, Reload},
	data_loaders::config::{ConfigStore, UiRegion},
	elevate::SystemElevator,
	error, info, logging,
	menu::{InquirePrompter, Menu, Prompter},
	patch::Outcome,
	paths::default_settings_path,
	sources::validate_source,
	utility::plural,
};

pub const DEBUG_NAME: &str = "BACKGROUND";

#[derive(Debug, Parser)]
#[command(name = "background", version, about = "Decorative backgrounds for the VS Code workbench")]
struct Cli {
	/// Settings file (defaults to the user config directory)
	#[arg(long, global = true, value_name = "PATH")]
	settings: Option<PathBuf>,

	/// VS Code `resources/app` directory; overrides the `appRoot` setting
	#[arg(long, global = true, value_name = "PATH")]
	app_root: Option<PathBuf>,

	/// Approve elevated writes without asking
	#[arg(long, short = 'y', global = true)]
	yes: bool,

	/// Write INFO and DEBUG lines to the log as well
	#[arg(long, global = true)]
	debug: bool,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Open the settings menu (default)
	Config,
	/// Inject the background into the workbench
	Install,
	/// Remove the injected background
	Uninstall,
	/// Reinstall with current settings if already installed
	Reload,
	/// Show install state and configured sources
	Status {
		/// Print the report as JSON
		#[arg(long)]
		json: bool,
	},
	/// Append image sources to a region
	Add {
		#[arg(value_parser = parse_region)]
		region: UiRegion,
		#[arg(required = true)]
		sources: Vec<String>,
	},
	/// Print the generated payload without installing it
	Preview,
}

fn parse_region(value: &str) -> Result<UiRegion, String> {
	UiRegion::parse(value).ok_or_else(|| format!("unknown region '{value}', expected window, editor, sidebar or panel"))
}

fn approve(prompter: &mut dyn Prompter) -> bool {
	prompter.confirm("The VS Code install is not writable. Write it with elevated permissions?", false)
}

fn report(outcome: Outcome, done: &str) {
	match outcome {
		Outcome::Declined => println!("Nothing was changed."),
		Outcome::Written | Outcome::Elevated => {
			println!("Background {done}. Restart VS Code to apply changes.")
		}
	}
}

fn status(app: &App, json: bool) -> Result<()> {
	let report = app.status();
	if json {
		println!("{}", serde_json::to_string_pretty(&report)?);
		return Ok(());
	}

	println!("Settings: {}", report.settings.display());
	match (&report.app_root, &report.host_error) {
		(Some(root), _) => println!("VS Code:  {}", root.display()),
		(None, Some(e)) => println!("VS Code:  {e}"),
		(None, None) => {}
	}
	if let Some(state) = &report.state {
		println!("State:    {state}");
	}
	if let Some(ok) = report.checksum_ok {
		println!("Checksum: {}", if ok { "ok" } else { "mismatch" });
	}
	if report.stale {
		println!("Settings changed since install; run `background reload`.");
	}

	for region in &report.regions {
		println!("\n{} ({})", region.region, plural(region.sources.len(), "source"));
		for source in &region.sources {
			println!("  {}  [{}]", source.source, plural(source.matches, "matching file"));
		}
	}
	Ok(())
}

fn add(app: &mut App, prompter: &mut dyn Prompter, region: UiRegion, sources: &[String]) -> Result<()> {
	for source in sources {
		if let Err(message) = validate_source(source) {
			bail!("{source}: {message}");
		}
	}

	let sources: Vec<String> = sources.iter().map(|s| s.trim().to_string()).collect();
	if !app.store.add_sources(region, &sources)? {
		println!("No new sources for {region}.");
		return Ok(());
	}
	println!("Added {} to {region}.", plural(sources.len(), "source"));

	if app.store.take_changed()
		&& app.is_installed()
		&& prompter.confirm("Background is installed. Reload now?", true)
	{
		report(app.install(|| approve(prompter))?, "reloaded");
	}
	Ok(())
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	logging::init(cli.debug);
	std::panic::set_hook(Box::new(|panic_info| {
		error!("[{}] Panic: {}", DEBUG_NAME, panic_info);
	}));

	info!("!---------- [{}] Starting ----------!", DEBUG_NAME);

	let settings = cli.settings.clone().unwrap_or_else(default_settings_path);
	let store = ConfigStore::open(&settings)
		.with_context(|| format!("failed to open settings {}", settings.display()))?;
	let mut app = App::new(store, Box::new(SystemElevator))
		.with_app_root(cli.app_root.clone())
		.with_assume_yes(cli.yes);
	let mut prompter = InquirePrompter;

	let result: Result<()> = match cli.command.unwrap_or(Command::Config) {
		Command::Config => Menu::new(&mut app, &mut prompter).run().map_err(Into::into),
		Command::Install => app.install(|| approve(&mut prompter)).map(|o| report(o, "installed")).map_err(Into::into),
		Command::Uninstall => app
			.uninstall(|| approve(&mut prompter))
			.map(|o| report(o, "uninstalled"))
			.map_err(Into::into),
		Command::Reload => app.reload(|| approve(&mut prompter)).map_err(Into::into).map(|reload| match reload {
			Reload::NotInstalled => println!("Background is not installed."),
			Reload::Unchanged => println!("Background is up to date. Restart VS Code to reshuffle."),
			Reload::Applied(outcome) => report(outcome, "reloaded"),
		}),
		Command::Status { json } => status(&app, json),
		Command::Add { region, sources } => add(&mut app, &mut prompter, region, &sources),
		Command::Preview => {
			println!("{}", app.payload());
			Ok(())
		}
	};

	if let Err(e) = &result {
		error!("[{}] {:#}", DEBUG_NAME, e);
	}
	result
}
