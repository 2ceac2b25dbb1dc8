use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::phrase_table::PhraseTable;
use super::{Symbol, TableError};

pub(super) const MAGIC: &[u8; 4] = b"DCPT";
pub(super) const VERSION: u8 = 1;
/// magic(4) + version(1) + reserved(3) + crc32(4)
pub(super) const HEADER_SIZE: usize = 12;

#[derive(Serialize, Deserialize)]
struct TableData {
    unknown_word_score: f32,
    entries: Vec<(String, Vec<(Vec<String>, f32)>)>,
}

impl PhraseTable {
    /// Serialize to bytes (DCPT format).
    pub fn to_bytes(&self) -> Result<Vec<u8>, TableError> {
        let mut entries: Vec<(String, Vec<(Vec<String>, f32)>)> = self
            .entries
            .iter()
            .map(|(source, phrases)| {
                let targets = phrases
                    .iter()
                    .map(|p| {
                        let words = p
                            .symbols()
                            .iter()
                            .filter_map(|s| match s {
                                Symbol::Word(w) => Some(w.to_string()),
                                Symbol::NonTerminal(_) => None,
                            })
                            .collect();
                        (words, p.score())
                    })
                    .collect();
                (source.clone(), targets)
            })
            .collect();
        // Hash map order is arbitrary; sort so identical tables give identical bytes.
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let data = TableData {
            unknown_word_score: self.unknown_word_score,
            entries,
        };
        let body = bincode::serialize(&data).map_err(TableError::Serialize)?;
        let crc = crc32fast::hash(&body);

        let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&[0u8; 3]); // reserved
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Deserialize from bytes (DCPT format).
    pub fn from_bytes(data: &[u8]) -> Result<Self, TableError> {
        if data.len() < 5 {
            return Err(TableError::InvalidHeader);
        }
        if &data[..4] != MAGIC {
            return Err(TableError::InvalidMagic);
        }
        if data[4] != VERSION {
            return Err(TableError::UnsupportedVersion(data[4]));
        }
        if data.len() < HEADER_SIZE {
            return Err(TableError::InvalidHeader);
        }
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&data[8..12]);
        let expected = u32::from_le_bytes(crc_bytes);
        let body = &data[HEADER_SIZE..];
        let actual = crc32fast::hash(body);
        if expected != actual {
            return Err(TableError::Checksum { expected, actual });
        }

        let data: TableData = bincode::deserialize(body).map_err(TableError::Deserialize)?;
        let mut table = PhraseTable::new(data.unknown_word_score);
        for (source, targets) in data.entries {
            for (words, score) in targets {
                table.insert(&source, &words.join(" "), score);
            }
        }
        Ok(table)
    }

    /// Open a compiled table file.
    pub fn open(path: &Path) -> Result<Self, TableError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Open either format: compiled files are recognized by their magic
    /// bytes, anything else is parsed as text.
    pub fn open_any(path: &Path, unknown_word_score: f32) -> Result<Self, TableError> {
        let bytes = fs::read(path)?;
        if bytes.starts_with(MAGIC) {
            return Self::from_bytes(&bytes);
        }
        let text = String::from_utf8(bytes).map_err(|e| TableError::Parse {
            line: 0,
            reason: format!("table is neither DCPT nor UTF-8 text: {e}"),
        })?;
        Self::parse(&text, unknown_word_score)
    }

    pub fn save(&self, path: &Path) -> Result<(), TableError> {
        Ok(fs::write(path, self.to_bytes()?)?)
    }
}
