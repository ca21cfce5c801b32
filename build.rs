// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("addonry")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Addonry Contributors")
        .about("World of Warcraft addon manager with content-verified manifests")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Config file path"),
        )
        .arg(
            Arg::new("cache_dir")
                .long("cache-dir")
                .value_name("PATH")
                .global(true)
                .help("Manifest cache directory"),
        )
        .subcommand(
            Command::new("install")
                .about("Install addons and start tracking them")
                .arg(
                    Arg::new("addons")
                        .required(true)
                        .num_args(1..)
                        .help("Addon names as the distribution site knows them"),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Update addons to their latest release")
                .arg(Arg::new("addons").num_args(0..).help("Addon names"))
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Update all tracked addons"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove addons and stop tracking them")
                .arg(
                    Arg::new("addons")
                        .required(true)
                        .num_args(1..)
                        .help("Addon names to remove"),
                ),
        )
        .subcommand(Command::new("list").about("List tracked addons and their installed versions"))
        .subcommand(
            Command::new("verify")
                .about("Verify installed files against their recorded digests")
                .arg(Arg::new("addons").num_args(0..).help("Addon names")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("addonry.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
