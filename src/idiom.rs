//! The constrained handler for un-mentioned group chatter: idiom (成语)
//! chaining with `#成语` and meaning lookup with `?成语`.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
struct Idiom {
    word: String,
    /// Space-separated syllables, e.g. "tian tian xiang shang"
    pinyin: String,
    meaning: String,
}

impl Idiom {
    fn first_syllable(&self) -> Option<&str> {
        self.pinyin.split_whitespace().next()
    }

    fn last_syllable(&self) -> Option<&str> {
        self.pinyin.split_whitespace().last()
    }
}

/// Idiom dictionary loaded from a tab-separated file (`word \t pinyin \t meaning`)
#[derive(Debug, Default)]
pub struct IdiomBook {
    idioms: Vec<Idiom>,
    by_word: HashMap<String, usize>,
}

impl IdiomBook {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read idiom file: {}", path.display()))?;
        let book = Self::parse(&content);
        info!("Loaded {} idioms from {}", book.len(), path.display());
        Ok(book)
    }

    pub fn parse(content: &str) -> Self {
        let mut book = Self::default();
        for line in content.lines() {
            let mut fields = line.split('\t').map(str::trim);
            let (Some(word), Some(pinyin)) = (fields.next(), fields.next()) else {
                continue;
            };
            if word.is_empty() || book.by_word.contains_key(word) {
                continue;
            }
            book.by_word.insert(word.to_string(), book.idioms.len());
            book.idioms.push(Idiom {
                word: word.to_string(),
                pinyin: pinyin.to_lowercase(),
                meaning: fields.next().unwrap_or("").to_string(),
            });
        }
        book
    }

    pub fn len(&self) -> usize {
        self.idioms.len()
    }

    pub fn is_idiom(&self, word: &str) -> bool {
        self.by_word.contains_key(word)
    }

    pub fn meaning(&self, word: &str) -> Option<&str> {
        let idiom = &self.idioms[*self.by_word.get(word)?];
        if idiom.meaning.is_empty() {
            None
        } else {
            Some(&idiom.meaning)
        }
    }

    /// Next idiom in the chain: one starting with the last character of
    /// `word`, else one starting with the same syllable
    pub fn next(&self, word: &str) -> Option<&str> {
        let current = &self.idioms[*self.by_word.get(word)?];
        let last_char = current.word.chars().last()?;

        self.idioms
            .iter()
            .find(|i| i.word != current.word && i.word.starts_with(last_char))
            .or_else(|| {
                let syllable = current.last_syllable()?;
                self.idioms
                    .iter()
                    .find(|i| i.word != current.word && i.first_syllable() == Some(syllable))
            })
            .map(|i| i.word.as_str())
    }

    /// Handle a group message. Returns `None` for anything that isn't an
    /// idiom request this book can answer.
    pub fn respond(&self, text: &str) -> Option<String> {
        let mut chars = text.chars();
        let flag = chars.next()?;
        let word = chars.as_str().trim();
        if !self.is_idiom(word) {
            return None;
        }
        match flag {
            '#' => self.next(word).map(str::to_string),
            '?' | '？' => self.meaning(word).map(str::to_string),
            _ => None,
        }
    }
}
