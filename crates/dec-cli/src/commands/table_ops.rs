use std::path::Path;

use dec_core::settings::settings;
use dec_core::source::PhraseTable;

use super::load_settings;

pub fn compile_table(input_txt: &str, output_file: &str, settings_file: Option<&str>) {
    load_settings(settings_file);
    let unknown = settings().tables.unknown_word_score;
    let table = die!(
        PhraseTable::load_text(Path::new(input_txt), unknown),
        "Error reading {input_txt}: {}"
    );
    die!(
        table.save(Path::new(output_file)),
        "Error writing {output_file}: {}"
    );
    println!(
        "Compiled {} source phrases, {} entries -> {output_file}",
        table.source_count(),
        table.entry_count()
    );
}

pub fn table_info(file: &str) {
    let unknown = settings().tables.unknown_word_score;
    let table = die!(
        PhraseTable::open_any(Path::new(file), unknown),
        "Error opening {file}: {}"
    );
    println!("Source phrases:     {}", table.source_count());
    println!("Entries:            {}", table.entry_count());
    println!("Longest source:     {} words", table.max_source_len());
}
