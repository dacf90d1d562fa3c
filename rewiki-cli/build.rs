use clap::{Arg, ArgAction, Command, ValueHint};
use clap_complete::{generate_to, shells::*};
use std::env;
use std::io::Error;

// Mirror of the transforms from src/transforms.rs
// We need to duplicate this here since build scripts can't access src/ modules
const AVAILABLE_TRANSFORMS: &[&str] = &["dom-treeviz", "annotations-json", "errors"];

const FORMATS: &[&str] = &["wikitext", "html", "pagebundle"];

fn main() -> Result<(), Error> {
    let outdir = match env::var_os("OUT_DIR") {
        None => return Ok(()),
        Some(outdir) => outdir,
    };

    let format_arg = |name: &'static str| {
        Arg::new(name)
            .long(name)
            .value_parser(clap::builder::PossibleValuesParser::new(FORMATS))
            .value_hint(ValueHint::Other)
    };

    let mut cmd = Command::new("rewiki")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Round-trip conversion between wikitext and annotated HTML")
        .arg(
            Arg::new("list-transforms")
                .long("list-transforms")
                .help("List available transforms")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Path to a rewiki.toml configuration file")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("inspect")
                .about("Inspect the document tree of a page")
                .arg(
                    Arg::new("path")
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("transform")
                        .index(2)
                        .value_parser(clap::builder::PossibleValuesParser::new(
                            AVAILABLE_TRANSFORMS,
                        )),
                )
                .arg(format_arg("from")),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert between document formats")
                .arg(
                    Arg::new("input")
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(format_arg("from"))
                .arg(format_arg("to"))
                .arg(
                    Arg::new("original")
                        .long("original")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("fetch")
                .about("Resolve a page from a JSON content store and convert it")
                .arg(
                    Arg::new("store")
                        .long("store")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(Arg::new("domain").long("domain"))
                .arg(Arg::new("title").long("title"))
                .arg(Arg::new("revision").long("revision"))
                .arg(Arg::new("slot").long("slot"))
                .arg(format_arg("format"))
                .arg(Arg::new("accept").long("accept").action(ArgAction::Append))
                .arg(Arg::new("accept-header").long("accept-header"))
                .arg(
                    Arg::new("body")
                        .long("body")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_hint(ValueHint::FilePath),
                ),
        );

    // Generate completions for bash
    generate_to(Bash, &mut cmd, "rewiki", &outdir)?;

    // Generate completions for zsh
    generate_to(Zsh, &mut cmd, "rewiki", &outdir)?;

    // Generate completions for fish
    generate_to(Fish, &mut cmd, "rewiki", &outdir)?;

    println!("cargo:warning=Shell completions generated in {outdir:?}");

    Ok(())
}
