use std::fs;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use dec_core::batch::run_ordered;
use dec_core::search::{
    translate, translate_chart, translate_chart_nbest, translate_nbest, DecodeError, SearchHooks,
    Translation,
};
use dec_core::settings::{settings, SearchAlgorithm, SearchOptions};
use dec_core::source::{CandidateSource, Grammar, PhraseTable, Sentence};

use super::{load_settings, CommandError};

/// Which decoder and model format a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Phrase table, stack decoding.
    Phrase,
    /// Synchronous grammar, chart decoding.
    Chart,
}

pub struct TranslateArgs<'a> {
    pub model: &'a str,
    pub input: Option<&'a str>,
    pub n: Option<usize>,
    pub threads: Option<usize>,
    pub settings_file: Option<&'a str>,
    pub algorithm: Option<SearchAlgorithm>,
    pub json: bool,
}

#[derive(Serialize)]
struct LineReport<'a> {
    line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    translations: &'a [Translation],
}

fn load_source(mode: Mode, path: &str) -> Result<Box<dyn CandidateSource>, CommandError> {
    let tables = &settings().tables;
    let path = Path::new(path);
    Ok(match mode {
        Mode::Phrase => Box::new(PhraseTable::open_any(path, tables.unknown_word_score)?),
        Mode::Chart => {
            let grammar = Grammar::load_text(path, tables.unknown_word_score)?;
            if tables.glue_rules {
                Box::new(grammar.with_glue(tables.glue_score))
            } else {
                Box::new(grammar)
            }
        }
    })
}

fn read_lines(input: Option<&str>) -> Result<Vec<String>, CommandError> {
    match input {
        Some(path) => fs::read_to_string(path)
            .map(|text| text.lines().map(str::to_string).collect())
            .map_err(|source| CommandError::Io {
                path: path.to_string(),
                source,
            }),
        None => io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<Vec<String>>>()
            .map_err(|source| CommandError::Io {
                path: "<stdin>".to_string(),
                source,
            }),
    }
}

fn decode(
    source: &dyn CandidateSource,
    mode: Mode,
    line: &str,
    n: usize,
    opts: &SearchOptions,
    hooks: &SearchHooks,
) -> Result<Vec<Translation>, DecodeError> {
    let sentence = Sentence::parse(line);
    match (mode, n) {
        (Mode::Phrase, 1) => translate(source, &sentence, opts, hooks).map(|t| vec![t]),
        (Mode::Phrase, n) => translate_nbest(source, &sentence, n, opts, hooks),
        (Mode::Chart, 1) => translate_chart(source, &sentence, opts, hooks).map(|t| vec![t]),
        (Mode::Chart, n) => translate_chart_nbest(source, &sentence, n, opts, hooks),
    }
}

fn write_text(
    out: &mut impl Write,
    index: usize,
    n: usize,
    result: &Result<Vec<Translation>, DecodeError>,
) -> io::Result<()> {
    match result {
        Ok(list) if n <= 1 => {
            let text = list.first().map(Translation::text).unwrap_or_default();
            writeln!(out, "{text}")
        }
        Ok(list) => {
            for t in list {
                writeln!(out, "{index} ||| {} ||| {:.4}", t.text(), t.score)?;
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("line {}: {e}", index + 1);
            // keep line alignment with the input
            if n <= 1 {
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

fn write_json(
    out: &mut impl Write,
    index: usize,
    result: &Result<Vec<Translation>, DecodeError>,
) -> io::Result<()> {
    let report = match result {
        Ok(list) => LineReport {
            line: index,
            error: None,
            translations: list,
        },
        Err(e) => LineReport {
            line: index,
            error: Some(e.to_string()),
            translations: &[],
        },
    };
    serde_json::to_writer(&mut *out, &report)?;
    writeln!(out)
}

/// One translation unless `-n` is given; `-n 0` asks for `nbest.size`.
fn output_count(requested: Option<usize>, nbest_size: usize) -> usize {
    match requested {
        None => 1,
        Some(0) => nbest_size.max(1),
        Some(n) => n,
    }
}

/// Translate every input line, one output block per line in input order.
/// A sentence that fails is reported and the run continues.
pub fn translate_cmd(mode: Mode, args: &TranslateArgs) {
    load_settings(args.settings_file);
    let s = settings();

    let source = die!(load_source(mode, args.model), "Error loading model: {}");
    let lines = die!(read_lines(args.input), "Error reading input: {}");

    let mut opts = SearchOptions::from_settings(s);
    if let Some(algorithm) = args.algorithm {
        opts.algorithm = algorithm;
    }
    let hooks = SearchHooks::default();
    let n = output_count(args.n, s.nbest.size);
    let threads = args.threads.unwrap_or(s.batch.threads);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut failed = 0usize;
    let mut write_error = None;

    let total = die!(
        run_ordered(
            lines,
            threads,
            |_, line| decode(source.as_ref(), mode, &line, n, &opts, &hooks),
            |index, result| {
                if let Err(e) = &result {
                    debug!(line = index, error = %e, "sentence failed");
                    failed += 1;
                }
                if write_error.is_some() {
                    return;
                }
                let written = if args.json {
                    write_json(&mut out, index, &result)
                } else {
                    write_text(&mut out, index, n, &result)
                };
                if let Err(e) = written {
                    write_error = Some(e);
                }
            },
        ),
        "Error starting workers: {}"
    );
    if let Some(e) = write_error {
        eprintln!("Error writing output: {e}");
        std::process::exit(1);
    }
    die!(out.flush(), "Error writing output: {}");

    eprintln!("Translated {}/{total} lines", total - failed);
}
