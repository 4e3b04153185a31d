use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use arbor_cli::ArborCli;
use arbor_cli::Commands;
use arbor_cli::OutputFormat;
use arbor_core::ArborConfig;
use arbor_core::ArborError;
use arbor_core::NodeId;
use arbor_core::NodeKind;
use arbor_core::Template;
use arbor_core::TemplateOptions;
use arbor_core::create_with_dialect;
use clap::Parser;
use owo_colors::OwoColorize;
use serde::Serialize;
use similar::ChangeTag;
use similar::TextDiff;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = ArborCli::parse();

	// Respect the NO_COLOR env var, the --no-color flag, and piped output.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Tracing goes to stderr so rendered output on stdout stays clean;
	// RUST_LOG selects the filter.
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.without_time()
		.try_init()
		.ok();

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Render { template, strict, set, data, output, check }) => run_render(
			&args,
			template,
			*strict,
			set,
			data.as_deref(),
			output.as_deref(),
			*check,
		),
		Some(Commands::Inspect { template, format }) => run_inspect(&args, template, *format),
		None => {
			eprintln!("No subcommand specified. Run `arbor --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Render through miette for rich diagnostics with help text and
		// error codes.
		match e.downcast::<ArborError>() {
			Ok(error) => {
				let report: miette::Report = (*error).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

fn resolve_root(args: &ArborCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn template_options(args: &ArborCli, config: Option<&ArborConfig>) -> TemplateOptions {
	let mut options = TemplateOptions::from_config(config);

	if args.no_cache {
		options.cache_enabled = false;
	}

	options
}

fn run_render(
	args: &ArborCli,
	template_path: &Path,
	strict: bool,
	bindings: &[String],
	data: Option<&Path>,
	output: Option<&Path>,
	check: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = ArborConfig::load(&root)?;
	let strict = strict || config.as_ref().is_some_and(|config| config.strict);
	let options = template_options(args, config.as_ref());

	let mut template = create_with_dialect(template_path, args.dialect.into(), strict, &options)?;

	if let Some(data) = data {
		for (name, value) in load_variables(data)? {
			template.set_value(name, value);
		}
	}

	for binding in bindings {
		let (name, value) = parse_binding(binding)?;
		template.set_value(name, value);
	}

	let rendered = template.render()?;

	match output {
		Some(output) if check => check_output(&root, output, &rendered),
		Some(output) => {
			std::fs::write(output, &rendered)?;
			println!("Wrote {}", make_relative(output, &root));
			Ok(())
		}
		None => {
			print!("{rendered}");
			Ok(())
		}
	}
}

/// Compare the rendered output against the file on disk without writing.
/// Exits with status 1 when the file is out of date.
fn check_output(
	root: &Path,
	output: &Path,
	rendered: &str,
) -> Result<(), Box<dyn std::error::Error>> {
	let rel = make_relative(output, root);
	let current = match std::fs::read_to_string(output) {
		Ok(current) => current,
		Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
		Err(error) => return Err(error.into()),
	};

	if current == rendered {
		println!("{rel} is up to date.");
		return Ok(());
	}

	eprintln!("{rel} is out of date.");
	print_diff(&current, rendered);
	process::exit(1);
}

fn run_inspect(
	args: &ArborCli,
	template_path: &Path,
	format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = ArborConfig::load(&root)?;
	let options = template_options(args, config.as_ref());

	let template = create_with_dialect(template_path, args.dialect.into(), false, &options)?;

	match format {
		OutputFormat::Json => {
			let report = InspectReport {
				name: template.name(),
				dialect: template.dialect().to_string(),
				nodes: template.node_count(),
				template: &template,
			};
			println!("{}", serde_json::to_string_pretty(&report)?);
		}
		OutputFormat::Text => print_tree(&template),
	}

	Ok(())
}

#[derive(Serialize)]
struct InspectReport<'a> {
	name: &'a str,
	dialect: String,
	nodes: usize,
	template: &'a Template,
}

fn print_tree(template: &Template) {
	println!(
		"{} `{}` ({}, {} nodes)",
		colored!("template", bold),
		template.name(),
		template.dialect(),
		template.node_count()
	);

	for &child in template.children(template.root()) {
		print_node(template, child, 1);
	}
}

fn print_node(template: &Template, id: NodeId, depth: usize) {
	let Some(node) = template.node(id) else {
		return;
	};

	let indent = "  ".repeat(depth);
	let position = node.position;

	match &node.kind {
		NodeKind::Text { content } => {
			println!("{indent}text {:?} at {position}", preview(content));
		}
		NodeKind::Variable { name } => {
			println!("{indent}variable {name} at {position}");
		}
		NodeKind::Block { name: Some(name), .. } => {
			println!("{indent}section `{name}` at {position}");
		}
		NodeKind::Block { name: None, .. } => {
			println!("{indent}block at {position}");
		}
		NodeKind::Condition { test, .. } => {
			println!("{indent}condition {test} at {position}");
		}
	}

	for &child in template.children(id) {
		print_node(template, child, depth + 1);
	}
}

/// Shorten long text runs for tree display.
fn preview(content: &str) -> String {
	const LIMIT: usize = 40;

	if content.chars().count() <= LIMIT {
		return content.to_string();
	}

	let head: String = content.chars().take(LIMIT).collect();
	format!("{head}…")
}

/// Load bindings from a JSON, TOML, or YAML file of flat scalar values.
fn load_variables(path: &Path) -> Result<BTreeMap<String, String>, ArborError> {
	let raw = std::fs::read_to_string(path)?;
	let data_error = |reason: String| ArborError::DataFile {
		path: path.display().to_string(),
		reason,
	};

	let extension = path
		.extension()
		.map(|extension| extension.to_string_lossy().to_lowercase())
		.unwrap_or_default();

	let value: serde_json::Value = match extension.as_str() {
		"json" => serde_json::from_str(&raw).map_err(|error| data_error(error.to_string()))?,
		"toml" => {
			let value: toml::Value =
				toml::from_str(&raw).map_err(|error| data_error(error.to_string()))?;
			serde_json::to_value(value).map_err(|error| data_error(error.to_string()))?
		}
		"yaml" | "yml" => {
			serde_yaml_ng::from_str(&raw).map_err(|error| data_error(error.to_string()))?
		}
		other => return Err(ArborError::UnsupportedDataFormat(other.to_string())),
	};

	let serde_json::Value::Object(entries) = value else {
		return Err(data_error("expected a table of scalar values".into()));
	};

	let mut variables = BTreeMap::new();

	for (name, value) in entries {
		let value = match value {
			serde_json::Value::String(text) => text,
			serde_json::Value::Number(number) => number.to_string(),
			serde_json::Value::Bool(flag) => flag.to_string(),
			serde_json::Value::Null => String::new(),
			serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
				return Err(data_error(format!("value for `{name}` is not a scalar")));
			}
		};

		variables.insert(name, value);
	}

	Ok(variables)
}

/// Split a `NAME=VALUE` binding from the command line.
fn parse_binding(binding: &str) -> Result<(String, String), ArborError> {
	match binding.split_once('=') {
		Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
		_ => Err(ArborError::InvalidBinding(binding.to_string())),
	}
}

/// Print a unified diff between two strings, colorized.
fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);

	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				eprint!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				eprint!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				eprint!("   {change}");
			}
		}
	}
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}
