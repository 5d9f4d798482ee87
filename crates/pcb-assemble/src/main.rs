use clap::Parser;
use pcb_assemble::{generate_from_file, IndexOptions, PadAliasTable, PipelineOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pcb-assemble",
    about = "Assemble a circuit description into a KiCad board and Gerber files"
)]
struct Cli {
    /// Circuit description (JSON)
    input: PathBuf,

    /// Project name used for the output directory and file names
    #[arg(default_value = pcb_assemble::DEFAULT_PROJECT)]
    project: String,

    /// Directory the project directory is created in
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Extra footprint library root (`.pretty` dir or a parent of several)
    #[arg(short = 'L', long = "library")]
    libraries: Vec<PathBuf>,

    /// JSON pad alias table merged over the built-in one
    #[arg(long)]
    pad_aliases: Option<PathBuf>,

    /// Do not scan the installed KiCad libraries
    #[arg(long)]
    no_system_libraries: bool,

    /// Also write a zip of the Gerber files
    #[arg(long)]
    zip: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut pad_aliases = PadAliasTable::default();
    if let Some(path) = &cli.pad_aliases {
        match PadAliasTable::load(path) {
            Ok(table) => pad_aliases.extend(table),
            Err(e) => {
                eprintln!("Error reading pad aliases: {e}");
                std::process::exit(1);
            }
        }
    }

    let opts = PipelineOptions {
        project_name: cli.project,
        output_root: cli.output_dir,
        index: IndexOptions {
            system_libraries: !cli.no_system_libraries,
            extra_roots: cli.libraries,
        },
        pad_aliases,
        bundle_zip: cli.zip,
        ..Default::default()
    };

    match generate_from_file(&cli.input, &opts) {
        Ok(report) => {
            let json = if cli.pretty {
                serde_json::to_string_pretty(&report)
            } else {
                serde_json::to_string(&report)
            };
            match json {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
