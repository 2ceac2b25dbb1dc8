use std::fs;

use dec_core::settings::{default_toml, parse_settings_toml};

pub fn settings_export() {
    print!("{}", default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(parse_settings_toml(&content), "Error: {}");
    println!(
        "OK: search.algorithm={:?}, search.stack_size={}, chart.rule_limit={}, nbest.size={}",
        s.search.algorithm, s.search.stack_size, s.chart.rule_limit, s.nbest.size
    );
}
