//! Immigration terms that get a definition tooltip wherever they appear in a
//! form label or help text.

use crate::domain::model::{GlossaryTerm, TermMatch, Tooltip, SOURCE_LANGUAGE};
use crate::domain::ports::Translator;
use crate::utils::error::{FormError, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const BUILTIN_TERMS: &[(&str, &[&str], &str)] = &[
    (
        "common-law partner",
        &["common-law", "common law", "common-law relationship"],
        "A person who has lived with you in a conjugal relationship for at least one year without interruption. Common-law partners do not need to be married.",
    ),
    (
        "conjugal partner",
        &["conjugal relationship"],
        "A partner outside Canada with whom you have had a committed relationship for at least one year, but could not live with or marry because of significant legal or immigration barriers.",
    ),
    (
        "permanent resident",
        &["permanent residence", "PR"],
        "A person who has been given permanent resident status by immigrating to Canada but is not a Canadian citizen. Permanent residents are citizens of other countries.",
    ),
    (
        "PR card",
        &["permanent resident card"],
        "The wallet-sized card that proves you are a permanent resident of Canada when you travel back to Canada.",
    ),
    (
        "UCI",
        &["Unique Client Identifier", "client ID"],
        "An 8 or 10 digit number that Immigration, Refugees and Citizenship Canada gives you the first time you apply. It stays the same on every application.",
    ),
    (
        "Confirmation of Permanent Residence",
        &["COPR"],
        "The document you received when you became a permanent resident. It shows your date of landing and your UCI.",
    ),
    (
        "principal applicant",
        &["main applicant"],
        "The person applying for themselves and, if any, their family members. Other family members on the application are dependants.",
    ),
    (
        "dependent child",
        &["dependent children"],
        "A child under 22 who is not a spouse or common-law partner, or an older child who has depended on parental financial support since before age 22 because of a physical or mental condition.",
    ),
    (
        "date of landing",
        &["landing date"],
        "The date you officially became a permanent resident of Canada.",
    ),
    (
        "marital status",
        &["marital"],
        "Your legal relationship status, such as single, married, common-law, divorced, separated or widowed.",
    ),
    (
        "residency obligation",
        &["physically present"],
        "The rule that a permanent resident must be physically present in Canada for at least 730 days (two years) in every five-year period.",
    ),
    (
        "sponsor",
        &["sponsorship"],
        "A Canadian citizen or permanent resident who agrees to support a family member's application and to provide for their basic needs.",
    ),
];

/// Compiled size cap for the term matcher, in bytes.
const MATCHER_SIZE_LIMIT: usize = 10 * (1 << 20);

#[derive(Deserialize)]
struct GlossaryFile {
    #[serde(default, rename = "term")]
    terms: Vec<GlossaryTerm>,
}

#[derive(Debug, Clone)]
pub struct Glossary {
    terms: Vec<GlossaryTerm>,
    matcher: Option<Regex>,
    /// Normalised surface form (term or alias) to index in `terms`.
    lookup: HashMap<String, usize>,
    size_limit: usize,
}

fn normalize(surface: &str) -> String {
    surface
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Glossary {
    /// Builds the matcher for `terms`. If it cannot be compiled the glossary
    /// keeps its definitions but finds no matches.
    pub fn new(terms: Vec<GlossaryTerm>) -> Self {
        let mut glossary = Self {
            terms,
            matcher: None,
            lookup: HashMap::new(),
            size_limit: MATCHER_SIZE_LIMIT,
        };
        if let Err(e) = glossary.rebuild() {
            tracing::warn!("Glossary term matching disabled: {}", e);
        }
        glossary
    }

    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_TERMS
                .iter()
                .map(|(term, aliases, definition)| GlossaryTerm {
                    term: term.to_string(),
                    aliases: aliases.iter().map(|a| a.to_string()).collect(),
                    definition: definition.to_string(),
                })
                .collect(),
        )
    }

    /// Loads `[[term]]` entries from a TOML file. A term with the same name
    /// as an existing one replaces its definition and aliases. On error the
    /// glossary is left as it was.
    pub fn merge_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let file: GlossaryFile = toml::from_str(&content).map_err(|e| FormError::ConfigValidationError {
            field: path.as_ref().display().to_string(),
            message: format!("Glossary parsing error: {}", e),
        })?;

        let count = file.terms.len();
        let mut merged = self.clone();
        for term in file.terms {
            match merged
                .terms
                .iter_mut()
                .find(|t| normalize(&t.term) == normalize(&term.term))
            {
                Some(existing) => *existing = term,
                None => merged.terms.push(term),
            }
        }
        merged.rebuild().map_err(|e| FormError::ConfigValidationError {
            field: path.as_ref().display().to_string(),
            message: e.to_string(),
        })?;
        *self = merged;
        Ok(count)
    }

    fn rebuild(&mut self) -> Result<()> {
        self.lookup.clear();
        let mut surfaces: Vec<String> = Vec::new();
        for (idx, term) in self.terms.iter().enumerate() {
            for surface in std::iter::once(&term.term).chain(term.aliases.iter()) {
                let key = normalize(surface);
                if key.is_empty() || self.lookup.contains_key(&key) {
                    continue;
                }
                self.lookup.insert(key, idx);
                surfaces.push(surface.clone());
            }
        }

        // Longest first so the alternation prefers "common-law partner" over "common-law".
        surfaces.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        self.matcher = None;
        if surfaces.is_empty() {
            return Ok(());
        }

        let alternation = surfaces
            .iter()
            .map(|s| {
                s.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");
        let matcher = RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
            .case_insensitive(true)
            .size_limit(self.size_limit)
            .build()
            .map_err(|e| FormError::ConfigError {
                message: format!("Glossary terms could not be compiled: {}", e),
            })?;
        self.matcher = Some(matcher);
        Ok(())
    }

    pub fn terms(&self) -> &[GlossaryTerm] {
        &self.terms
    }

    pub fn get(&self, term: &str) -> Option<&GlossaryTerm> {
        self.lookup.get(&normalize(term)).map(|&i| &self.terms[i])
    }

    /// Non-overlapping glossary matches in `text`, in order of appearance.
    /// Offsets are in characters.
    pub fn find_terms(&self, text: &str) -> Vec<TermMatch> {
        let Some(matcher) = &self.matcher else {
            return Vec::new();
        };

        matcher
            .find_iter(text)
            .filter_map(|m| {
                let idx = *self.lookup.get(&normalize(m.as_str()))?;
                let start = text[..m.start()].chars().count();
                Some(TermMatch {
                    term: self.terms[idx].term.clone(),
                    start,
                    end: start + m.as_str().chars().count(),
                })
            })
            .collect()
    }

    /// Definitions, in `language`, of every distinct term found in `texts`.
    pub async fn tooltips(
        &self,
        texts: &[&str],
        language: &str,
        translator: &dyn Translator,
    ) -> Result<Vec<Tooltip>> {
        let mut found: Vec<&GlossaryTerm> = Vec::new();
        for text in texts {
            for m in self.find_terms(text) {
                if let Some(term) = self.get(&m.term) {
                    if !found.iter().any(|t| t.term == term.term) {
                        found.push(term);
                    }
                }
            }
        }
        self.localize_terms(&found, language, translator).await
    }

    pub async fn localize_terms(
        &self,
        terms: &[&GlossaryTerm],
        language: &str,
        translator: &dyn Translator,
    ) -> Result<Vec<Tooltip>> {
        let sources: Vec<String> = terms.iter().map(|t| t.definition.clone()).collect();
        let translated = if language == SOURCE_LANGUAGE || sources.is_empty() {
            sources.clone()
        } else {
            translator
                .translate_batch(&sources, SOURCE_LANGUAGE, language)
                .await?
        };

        Ok(terms
            .iter()
            .zip(translated)
            .map(|(term, definition)| Tooltip {
                term: term.term.clone(),
                definition,
                source_definition: term.definition.clone(),
            })
            .collect())
    }
}
