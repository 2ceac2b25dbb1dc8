use std::path::Path;

use clap::{Parser, Subcommand};

use dec_cli::commands::translate_ops::{translate_cmd, Mode, TranslateArgs};
use dec_cli::commands::{config_ops, table_ops};
use dec_cli::trace_init::init_tracing;
use dec_core::settings::SearchAlgorithm;

#[derive(Parser)]
#[command(name = "dectool", about = "Phrase-based and hierarchical decoder")]
struct Cli {
    /// Directory for JSON trace logs (requires --features trace)
    #[arg(long, global = true)]
    log_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct DecodeOpts {
    /// Input file, one sentence per line (default: stdin)
    #[arg(long)]
    input: Option<String>,
    /// Number of translations per sentence (default: 1; 0 uses nbest.size)
    #[arg(short, long)]
    n: Option<usize>,
    /// Worker threads (default: batch.threads)
    #[arg(long)]
    threads: Option<usize>,
    /// Custom settings TOML file
    #[arg(long)]
    settings: Option<String>,
    /// Emit one JSON object per input line
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Translate with a phrase table (text or compiled)
    Translate {
        /// Phrase table file
        table: String,
        /// Search algorithm
        #[arg(long, value_parser = ["normal", "cube-pruning"])]
        algorithm: Option<String>,
        #[command(flatten)]
        opts: DecodeOpts,
    },
    /// Translate with a synchronous grammar
    Chart {
        /// Grammar file
        grammar: String,
        #[command(flatten)]
        opts: DecodeOpts,
    },
    /// Compile a text phrase table to the binary format
    CompileTable {
        /// Input text file
        input_txt: String,
        /// Output binary file
        output_file: String,
        /// Custom settings TOML file
        #[arg(long)]
        settings: Option<String>,
    },
    /// Show phrase table info (text or compiled)
    TableInfo {
        /// Phrase table file
        file: String,
    },
    /// Export default settings as TOML
    SettingsExport,
    /// Validate a custom settings TOML file
    SettingsValidate {
        /// Path to the TOML file
        file: String,
    },
}

fn run_decode(mode: Mode, model: &str, algorithm: Option<SearchAlgorithm>, opts: &DecodeOpts) {
    translate_cmd(
        mode,
        &TranslateArgs {
            model,
            input: opts.input.as_deref(),
            n: opts.n,
            threads: opts.threads,
            settings_file: opts.settings.as_deref(),
            algorithm,
            json: opts.json,
        },
    );
}

fn main() {
    let cli = Cli::parse();
    let _trace = init_tracing(cli.log_dir.as_deref().map(Path::new));

    match cli.command {
        Command::Translate {
            table,
            algorithm,
            opts,
        } => {
            let algorithm = algorithm.map(|a| match a.as_str() {
                "cube-pruning" => SearchAlgorithm::CubePruning,
                _ => SearchAlgorithm::Normal,
            });
            run_decode(Mode::Phrase, &table, algorithm, &opts);
        }
        Command::Chart { grammar, opts } => run_decode(Mode::Chart, &grammar, None, &opts),
        Command::CompileTable {
            input_txt,
            output_file,
            settings,
        } => table_ops::compile_table(&input_txt, &output_file, settings.as_deref()),
        Command::TableInfo { file } => table_ops::table_info(&file),
        Command::SettingsExport => config_ops::settings_export(),
        Command::SettingsValidate { file } => config_ops::settings_validate(&file),
    }
}
