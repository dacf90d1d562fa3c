// Command-line interface for rewiki
//
// This binary converts between wikitext, annotated HTML and page bundles, and
// answers page requests against a local content store.
//
// Converting:
//
// The conversion needs a to and from pair. The from side is auto-detected from the file
// extension, while being overwrittable by an explicit --from flag. Converting back to
// wikitext with --original keeps every unchanged span of the original byte for byte.
// Usage:
//  rewiki <input> --to <format> [--from <format>] [--original <file>] [-o <file>]  - Convert (default)
//  rewiki convert <input> --to <format> ...                                        - Same as above (explicit)
//  rewiki fetch --store <file> --domain <d> --title <t> [--format <f>] ...         - Run a page request
//  rewiki inspect <path> [<transform>]                                             - Look inside a document
//  rewiki --list-transforms                                                        - List available transforms
//
// Extra Parameters:
//
// Parameters can be passed using --extra-<parameter-name> <value>. Known keys override the
// configuration (inline-data, slot, timeout-ms); the rest go to the output format.
// Example:
//  rewiki page.wiki --to html --extra-version 2.7.0 --extra-inline-data false

mod transforms;

use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use rewiki_babel::formats::html::HtmlOptions;
use rewiki_babel::handler::HandlerSettings;
use rewiki_babel::negotiate::parse_accept;
use rewiki_babel::{
    ContentVersion, FormatRegistry, InMemoryContentSource, MessageCatalog, Request, RequestBody,
    RequestHandler,
};
use rewiki_config::{Loader, RewikiConfig, LOCAL_CONFIG_FILE};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Parse extra-* arguments from command line args
/// Returns (cleaned_args_without_extras, extra_params_map)
///
/// Supports both:
/// - `--extra-<key> <value>` (explicit value)
/// - `--extra-<key>` (boolean flag, defaults to "true")
/// - `--extras-<key>` (alias for `--extra-<key>`)
fn parse_extra_args(args: &[String]) -> (Vec<String>, HashMap<String, String>) {
    let mut cleaned_args = Vec::new();
    let mut extra_params = HashMap::new();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];

        let key_opt = if let Some(key) = arg.strip_prefix("--extra-") {
            Some(key)
        } else {
            arg.strip_prefix("--extras-")
        };

        if let Some(key) = key_opt {
            let has_value = args.get(i + 1).is_some_and(|next| !next.starts_with('-'));

            if has_value {
                extra_params.insert(key.to_string(), args[i + 1].clone());
                i += 2;
            } else {
                extra_params.insert(key.to_string(), "true".to_string());
                i += 1;
            }
            continue;
        }

        cleaned_args.push(arg.clone());
        i += 1;
    }

    (cleaned_args, extra_params)
}

fn build_cli() -> Command {
    Command::new("rewiki")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Round-trip conversion between wikitext and annotated HTML")
        .long_about(
            "rewiki converts wiki pages to annotated HTML and back without losing a byte.\n\n\
            Commands:\n  \
            - convert: Transform between formats (wikitext, html, pagebundle)\n  \
            - fetch:   Resolve a page from a content store and convert it like a server would\n  \
            - inspect: View the document tree, its annotations or its errors\n\n\
            Extra Parameters:\n  \
            Use --extra-<name> [value] to pass format-specific options.\n  \
            Boolean flags can omit the value (defaults to 'true').\n\n\
            Examples:\n  \
            rewiki page.wiki --to html                            # HTML to stdout\n  \
            rewiki page.wiki --to pagebundle -o page.json          # Page bundle file\n  \
            rewiki edited.html --to wikitext --original page.wiki  # Minimal-diff markup",
        )
        .arg_required_else_help(true)
        .subcommand_required(false)
        .arg(
            Arg::new("list-transforms")
                .long("list-transforms")
                .help("List available transforms")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to a rewiki.toml configuration file")
                .value_hint(ValueHint::FilePath)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log pipeline steps to stderr (RUST_LOG still wins)")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("inspect")
                .about("Inspect the document tree of a page")
                .long_about(
                    "View a document the way the converter sees it.\n\n\
                    Transforms:\n  \
                    - dom-treeviz:      Node tree with ids (default)\n  \
                    - annotations-json: data-parsoid / data-mw keyed by node id\n  \
                    - errors:           Error envelopes in document order\n\n\
                    Extra Parameters:\n  \
                    --extra-show-dsr      Show source ranges in dom-treeviz\n\n\
                    Examples:\n  \
                    rewiki inspect page.wiki                   # Tree visualization\n  \
                    rewiki inspect page.html errors            # What could not be converted",
                )
                .arg(
                    Arg::new("path")
                        .help("Path to a wikitext, HTML or page bundle file")
                        .required(true)
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("transform")
                        .help("Transform to apply. Defaults to 'dom-treeviz'")
                        .required(false)
                        .value_parser(clap::builder::PossibleValuesParser::new(
                            transforms::AVAILABLE_TRANSFORMS,
                        ))
                        .index(2)
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .help("Input format (auto-detected from file extension if not specified)")
                        .value_hint(ValueHint::Other),
                ),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert between document formats (default command)")
                .long_about(
                    "Convert documents between formats.\n\n\
                    Supported formats:\n  \
                    - wikitext:   Wiki markup (.wiki, .wikitext)\n  \
                    - html:       HTML with inline annotations (.html, .htm)\n  \
                    - pagebundle: HTML plus annotations as JSON (.json)\n\n\
                    The source format is auto-detected from the file extension.\n\
                    Output goes to stdout by default, or use -o to specify a file.\n\n\
                    Examples:\n  \
                    rewiki convert page.wiki --to html\n  \
                    rewiki convert page.json --to wikitext --original page.wiki",
                )
                .arg(
                    Arg::new("input")
                        .help("Input file path")
                        .required(true)
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .help("Source format (auto-detected from file extension if not specified)")
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .help("Target format (required)")
                        .required(true)
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("original")
                        .long("original")
                        .value_name("PATH")
                        .help("Wikitext the input was produced from; unchanged spans are kept verbatim")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Output file path (defaults to stdout)")
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("fetch")
                .about("Resolve a page from a JSON content store and convert it")
                .long_about(
                    "Run one page request the way a server would: resolve the page, negotiate\n\
                    the output format and version, convert, and print the response body.\n\
                    Failures print the error as JSON on stderr.\n\n\
                    Examples:\n  \
                    rewiki fetch --store pages.json --domain en.wiki.test --title Main_Page\n  \
                    rewiki fetch --store pages.json --domain en.wiki.test --title Main_Page \\\n    \
                    --format pagebundle --accept 2.7.0",
                )
                .arg(
                    Arg::new("store")
                        .long("store")
                        .value_name("PATH")
                        .help("JSON content store")
                        .required(true)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("domain")
                        .long("domain")
                        .help("Wiki domain")
                        .required(true),
                )
                .arg(
                    Arg::new("title")
                        .long("title")
                        .help("Page title")
                        .required(true),
                )
                .arg(
                    Arg::new("revision")
                        .long("revision")
                        .help("Revision id or 'latest'"),
                )
                .arg(Arg::new("slot").long("slot").help("Content slot"))
                .arg(
                    Arg::new("format")
                        .long("format")
                        .help("Output format")
                        .default_value("html"),
                )
                .arg(
                    Arg::new("accept")
                        .long("accept")
                        .value_name("VERSION")
                        .help("Acceptable content version, most wanted first (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("accept-header")
                        .long("accept-header")
                        .value_name("HEADER")
                        .help("Accept header with profile parameters, used instead of --accept"),
                )
                .arg(
                    Arg::new("body")
                        .long("body")
                        .value_name("PATH")
                        .help("Content to convert instead of the stored revision (.wiki, .html or .json)")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Output file path (defaults to stdout)")
                        .value_hint(ValueHint::FilePath),
                ),
        )
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let (cleaned_args, mut extra_params) = parse_extra_args(&args);

    let cli = build_cli();
    let matches = match cli.clone().try_get_matches_from(&cleaned_args) {
        Ok(m) => m,
        Err(e) => {
            // A bare file argument means the implicit convert command.
            if cleaned_args.len() > 1
                && !cleaned_args[1].starts_with('-')
                && !["inspect", "convert", "fetch", "help"].contains(&cleaned_args[1].as_str())
            {
                let mut new_args = vec![cleaned_args[0].clone(), "convert".to_string()];
                new_args.extend_from_slice(&cleaned_args[1..]);

                match cli.try_get_matches_from(&new_args) {
                    Ok(m) => m,
                    Err(e2) => e2.exit(),
                }
            } else {
                e.exit();
            }
        }
    };

    if matches.get_flag("list-transforms") {
        handle_list_transforms_command();
        return;
    }

    let mut config = load_cli_config(matches.get_one::<String>("config").map(|s| s.as_str()));
    apply_config_overrides(&mut config, &mut extra_params);
    init_logging(&config, matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("inspect", sub_matches)) => {
            let path = required(sub_matches, "path");
            let transform = sub_matches
                .get_one::<String>("transform")
                .map(|s| s.as_str())
                .unwrap_or(transforms::DEFAULT_TRANSFORM);
            let from = sub_matches
                .get_one::<String>("from")
                .cloned()
                .unwrap_or_else(|| detect_format(path).unwrap_or_else(|| "wikitext".to_string()));
            handle_inspect_command(path, &from, transform, &extra_params, &config);
        }
        Some(("convert", sub_matches)) => {
            let input = required(sub_matches, "input");
            let to = required(sub_matches, "to");
            let from = match sub_matches.get_one::<String>("from") {
                Some(f) => f.to_string(),
                None => detect_format(input).unwrap_or_else(|| {
                    eprintln!("Error: Could not detect format from filename '{input}'");
                    eprintln!("Please specify --from explicitly");
                    std::process::exit(1);
                }),
            };
            let original = sub_matches.get_one::<String>("original").map(|s| s.as_str());
            let output = sub_matches.get_one::<String>("output").map(|s| s.as_str());
            handle_convert_command(input, &from, to, original, output, &extra_params, &config);
        }
        Some(("fetch", sub_matches)) => {
            handle_fetch_command(sub_matches, &config);
        }
        _ => {
            eprintln!("Unknown subcommand. Use --help for usage information.");
            std::process::exit(1);
        }
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    match matches.get_one::<String>(name) {
        Some(value) => value.as_str(),
        None => {
            eprintln!("Error: missing required argument '{name}'");
            std::process::exit(2);
        }
    }
}

/// RUST_LOG wins; otherwise `--verbose`, otherwise the configured level.
fn init_logging(config: &RewikiConfig, verbose: bool) {
    let fallback = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn detect_format(path: &str) -> Option<String> {
    FormatRegistry::default().detect_format_from_filename(path)
}

fn registry_for(config: &RewikiConfig) -> FormatRegistry {
    FormatRegistry::with_html_options(html_options_from_config(config))
}

fn html_options_from_config(config: &RewikiConfig) -> HtmlOptions {
    let newest = config
        .negotiation
        .content_versions
        .iter()
        .max()
        .map(ContentVersion::to_string);
    let options = HtmlOptions::default()
        .with_inline_data(config.html.inline_data)
        .with_localizer(Arc::new(MessageCatalog::from(config)));
    match newest {
        Some(version) => options.with_version(version),
        None => options,
    }
}

fn read_input(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{path}': {e}");
        std::process::exit(1);
    })
}

fn write_output(output: Option<&str>, data: &[u8]) {
    match output {
        Some(path) => fs::write(path, data).unwrap_or_else(|e| {
            eprintln!("Error writing file '{path}': {e}");
            std::process::exit(1);
        }),
        None => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(data).and_then(|()| stdout.flush()) {
                eprintln!("Error writing output: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Handle the inspect command
fn handle_inspect_command(
    path: &str,
    from: &str,
    transform: &str,
    extra_params: &HashMap<String, String>,
    config: &RewikiConfig,
) {
    let source = read_input(path);
    let doc = registry_for(config).parse(&source, from).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let catalog = MessageCatalog::from(config);
    let output = transforms::execute_transform(&doc, transform, extra_params, &catalog)
        .unwrap_or_else(|e| {
            eprintln!("Execution error: {e}");
            std::process::exit(1);
        });

    print!("{output}");
}

/// Handle the convert command
fn handle_convert_command(
    input: &str,
    from: &str,
    to: &str,
    original: Option<&str>,
    output: Option<&str>,
    extra_params: &HashMap<String, String>,
    config: &RewikiConfig,
) {
    let registry = registry_for(config);

    for name in [from, to] {
        if let Err(e) = registry.get(name) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    let source = read_input(input);
    let doc = registry.parse(&source, from).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let mut format_options = extra_params.clone();
    if let Some(path) = original {
        if to != "wikitext" {
            eprintln!("Error: --original only applies when converting to wikitext");
            std::process::exit(1);
        }
        format_options.insert("original".to_string(), read_input(path));
    }

    let result = registry
        .serialize_with_options(&doc, to, &format_options)
        .unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });

    tracing::debug!(from, to, errors = doc.error_count(), "converted");
    write_output(output, result.as_bytes());
}

/// Handle the fetch command
fn handle_fetch_command(matches: &ArgMatches, config: &RewikiConfig) {
    let store_path = required(matches, "store");
    let store = InMemoryContentSource::from_json(&read_input(store_path)).unwrap_or_else(|e| {
        eprintln!("Error loading content store '{store_path}': {e}");
        std::process::exit(1);
    });

    let accept: Vec<ContentVersion> = match matches.get_one::<String>("accept-header") {
        Some(header) => parse_accept(header),
        None => matches
            .get_many::<String>("accept")
            .into_iter()
            .flatten()
            .map(|raw| {
                raw.parse().unwrap_or_else(|e| {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                })
            })
            .collect(),
    };

    let mut request = Request::new(
        required(matches, "domain"),
        required(matches, "title"),
        required(matches, "format"),
    )
    .with_accept(accept);
    if let Some(revision) = matches.get_one::<String>("revision") {
        request = request.with_revision(revision.as_str());
    }
    if let Some(slot) = matches.get_one::<String>("slot") {
        request = request.with_slot(slot.as_str());
    }
    if let Some(path) = matches.get_one::<String>("body") {
        request = request.with_body(request_body(path));
    }

    let handler = RequestHandler::new(Arc::new(store), HandlerSettings::from(config));
    match handler.handle(&request) {
        Ok(response) => {
            if let Some(state) = response.state {
                tracing::info!(%state, status = response.status, "fetched");
            }
            let output = matches.get_one::<String>("output").map(|s| s.as_str());
            write_output(output, &response.body);
        }
        Err(err) => {
            eprintln!("{}", err.to_json());
            std::process::exit(1);
        }
    }
}

fn request_body(path: &str) -> RequestBody {
    let content = read_input(path);
    match detect_format(path).as_deref() {
        Some("html") => RequestBody::Html(content),
        Some("pagebundle") => RequestBody::PageBundle(content),
        Some("wikitext") => RequestBody::Wikitext(content.into_bytes()),
        _ => {
            eprintln!("Error: Could not detect the body format of '{path}'");
            std::process::exit(1);
        }
    }
}

/// Handle the list-transforms command
fn handle_list_transforms_command() {
    println!("Available transforms:\n");
    for transform_name in transforms::AVAILABLE_TRANSFORMS {
        println!("  {transform_name}");
    }

    println!("\nConversion formats:");
    let registry = FormatRegistry::default();
    for format_name in registry.list_formats() {
        let description = registry
            .get(&format_name)
            .map(|format| format.description().to_string())
            .unwrap_or_default();
        println!("  {format_name:<12}{description}");
    }
}

fn load_cli_config(explicit_path: Option<&str>) -> RewikiConfig {
    let loader = Loader::new().with_optional_file(LOCAL_CONFIG_FILE);
    let loader = if let Some(path) = explicit_path {
        loader.with_file(path)
    } else {
        loader
    };

    loader.build().unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err}");
        std::process::exit(1);
    })
}

fn apply_config_overrides(config: &mut RewikiConfig, extra_params: &mut HashMap<String, String>) {
    if let Some(raw) = extra_params.remove("inline-data") {
        config.html.inline_data = parse_bool_arg("inline-data", &raw);
    }
    if let Some(slot) = take_override(extra_params, &["slot", "default-slot"]) {
        config.resolver.default_slot = slot;
    }
    if let Some(raw) = take_override(extra_params, &["timeout-ms", "timeout"]) {
        config.handler.timeout_ms = raw.parse().unwrap_or_else(|_| {
            eprintln!("Invalid number '{raw}' for --extra-timeout-ms");
            std::process::exit(1);
        });
    }
}

fn take_override(map: &mut HashMap<String, String>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(value) = map.remove(*key) {
            return Some(value);
        }
    }
    None
}

fn parse_bool_arg(flag: &str, raw: &str) -> bool {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => true,
        "false" | "0" | "no" | "n" => false,
        other => {
            eprintln!("Invalid boolean value '{other}' for --extra-{flag}");
            std::process::exit(1);
        }
    }
}
