//! Translation tables used by `translate`.

use fxhash::FxHashMap;

/// Resolves a phrase from one language to another.
pub trait Translator {
    fn translate(&self, text: &str, from: &str, to: &str) -> Option<String>;
}

/// Knows no translations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranslations;

impl Translator for NoTranslations {
    fn translate(&self, _text: &str, _from: &str, _to: &str) -> Option<String> {
        None
    }
}

/// Translations held in memory, keyed by `(from, to, text)`.
#[derive(Debug, Clone, Default)]
pub struct TranslationTable {
    entries: FxHashMap<(String, String, String), String>,
}

impl TranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: &str, to: &str, text: &str, translation: &str) {
        self.entries.insert(
            (from.to_string(), to.to_string(), text.to_string()),
            translation.to_string(),
        );
    }
}

impl Translator for TranslationTable {
    fn translate(&self, text: &str, from: &str, to: &str) -> Option<String> {
        if from == to {
            return Some(text.to_string());
        }
        self.entries
            .get(&(from.to_string(), to.to_string(), text.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_translation() {
        let mut table = TranslationTable::new();
        table.insert("english", "french", "Theorem", "Théorème");
        assert_eq!(
            table.translate("Theorem", "english", "french").as_deref(),
            Some("Théorème")
        );
        assert_eq!(table.translate("Lemma", "english", "french"), None);
        assert_eq!(
            table.translate("Lemma", "english", "english").as_deref(),
            Some("Lemma")
        );
        assert_eq!(NoTranslations.translate("Lemma", "english", "german"), None);
    }
}
