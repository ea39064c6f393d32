//! Word decomposition into sign clips.
//!
//! A normalized word resolves in tiers:
//!
//! 1. The whole word, against the word patterns. A hit ends decomposition.
//! 2. The definite article "ال" as one letter clip, if the word starts with
//!    it and a clip exists.
//! 3. A left-to-right character scan against the letter patterns. A lam
//!    followed by any alef form is tried as the "لا" ligature first; other
//!    characters are folded to their base letter before lookup.
//!
//! Characters with no clip are skipped. An empty result is not an error.

use crate::config::{DEFAULT_LETTER_KEY_PATTERNS, DEFAULT_WORD_KEY_PATTERNS};
use crate::content::existence::ExistenceResolver;
use crate::content::store::StoreError;
use std::sync::Arc;
use tracing::instrument;

pub const DEFINITE_ARTICLE: &str = "ال";

pub const LAM_ALEF: &str = "لا";

const LAM: char = 'ل';

const ALEF: char = 'ا';

/// Alef and its hamza/madda forms.
const ALEF_VARIANTS: [char; 4] = ['ا', 'أ', 'إ', 'آ'];

/// Map a letter form onto the base letter clips are stored under.
pub fn fold_char(c: char) -> char {
    match c {
        'أ' | 'إ' | 'آ' => 'ا',
        'ؤ' => 'و',
        'ئ' | 'ى' => 'ي',
        'ة' => 'ه',
        other => other,
    }
}

/// Word- and letter-level content key patterns, in lookup order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPatterns {
    pub word: Vec<String>,
    pub letter: Vec<String>,
}

impl Default for KeyPatterns {
    fn default() -> Self {
        Self {
            word: DEFAULT_WORD_KEY_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            letter: DEFAULT_LETTER_KEY_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// One resolved unit: what was matched and where its clip lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub display_token: String,
    pub content_key: String,
}

impl ResolvedToken {
    fn new(display_token: impl Into<String>, content_key: String) -> Self {
        Self {
            display_token: display_token.into(),
            content_key,
        }
    }
}

/// Collects tokens up to a limit.
struct Bounded {
    tokens: Vec<ResolvedToken>,
    limit: usize,
}

impl Bounded {
    fn is_full(&self) -> bool {
        self.tokens.len() >= self.limit
    }

    fn push(&mut self, token: ResolvedToken) {
        if !self.is_full() {
            self.tokens.push(token);
        }
    }
}

pub struct WordDecomposer {
    resolver: Arc<ExistenceResolver>,
    patterns: KeyPatterns,
}

impl WordDecomposer {
    pub fn new(resolver: Arc<ExistenceResolver>, patterns: KeyPatterns) -> Self {
        Self { resolver, patterns }
    }

    /// Decompose a normalized word into clips.
    ///
    /// # Errors
    ///
    /// `StoreError` if any existence check fails.
    pub async fn decompose(&self, word: &str) -> Result<Vec<ResolvedToken>, StoreError> {
        self.decompose_bounded(word, usize::MAX).await
    }

    /// Decompose, producing at most `limit` tokens.
    ///
    /// No existence check is issued once `limit` tokens are collected.
    ///
    /// # Errors
    ///
    /// `StoreError` if any existence check fails.
    #[instrument(skip(self), fields(word = %word))]
    pub async fn decompose_bounded(
        &self,
        word: &str,
        limit: usize,
    ) -> Result<Vec<ResolvedToken>, StoreError> {
        let mut out = Bounded {
            tokens: Vec::new(),
            limit,
        };
        if word.is_empty() || out.is_full() {
            return Ok(out.tokens);
        }

        if let Some(key) = self.word(word).await? {
            tracing::debug!(target: "sign.resolver", "Whole-word clip found");
            out.push(ResolvedToken::new(word, key));
            return Ok(out.tokens);
        }

        let chars: Vec<char> = word.chars().collect();
        let mut i = 0;

        if word.starts_with(DEFINITE_ARTICLE) {
            if let Some(key) = self.letter(DEFINITE_ARTICLE).await? {
                out.push(ResolvedToken::new(DEFINITE_ARTICLE, key));
                i = DEFINITE_ARTICLE.chars().count();
            }
        }

        while !out.is_full() {
            let Some(&current) = chars.get(i) else {
                break;
            };

            let next_is_alef = chars
                .get(i + 1)
                .is_some_and(|next| ALEF_VARIANTS.contains(next));

            if current == LAM && next_is_alef {
                if let Some(key) = self.letter(LAM_ALEF).await? {
                    out.push(ResolvedToken::new(LAM_ALEF, key));
                } else {
                    if let Some(key) = self.letter(&LAM.to_string()).await? {
                        out.push(ResolvedToken::new(LAM.to_string(), key));
                    }
                    if !out.is_full() {
                        if let Some(key) = self.letter(&ALEF.to_string()).await? {
                            out.push(ResolvedToken::new(ALEF.to_string(), key));
                        }
                    }
                }
                i += 2;
                continue;
            }

            let folded = fold_char(current).to_string();
            if let Some(key) = self.letter(&folded).await? {
                out.push(ResolvedToken::new(folded, key));
            } else {
                tracing::debug!(target: "sign.resolver", letter = %folded, "No clip for letter, skipping");
            }
            i += 1;
        }

        Ok(out.tokens)
    }

    async fn word(&self, token: &str) -> Result<Option<String>, StoreError> {
        self.resolver
            .first_existing(&self.patterns.word, token)
            .await
    }

    async fn letter(&self, token: &str) -> Result<Option<String>, StoreError> {
        self.resolver
            .first_existing(&self.patterns.letter, token)
            .await
    }
}
