//! # Query Predicates
//!
//! Search strings (`q` in listings, SEARCH subscription descriptors) are
//! evaluated by a [`QueryPredicate`]. The asset graph does not know the
//! grammar; it asks the predicate to validate a query once and then to test
//! each candidate asset.
//!
//! [`TermPredicate`] is the shipped grammar: whitespace-separated terms, all
//! of which must occur (case-insensitively) in the asset's ref, comment or
//! tags. Double quotes group a phrase; a leading `-` negates a term.

use ahub_core::{AhubError, Asset};

/// A compiled search query.
pub trait CompiledQuery: Send + Sync {
    fn matches(&self, asset: &Asset) -> bool;
}

/// Search-string grammar.
pub trait QueryPredicate: Send + Sync {
    /// Parse `query`.
    ///
    /// # Errors
    ///
    /// [`AhubError::Corrupt`] when the query is malformed.
    fn compile(&self, query: &str) -> Result<Box<dyn CompiledQuery>, AhubError>;
}

/// Case-insensitive all-terms-must-match grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermPredicate;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    text: String,
    negated: bool,
}

#[derive(Debug, Clone)]
struct Terms(Vec<Term>);

impl CompiledQuery for Terms {
    fn matches(&self, asset: &Asset) -> bool {
        let haystacks: Vec<String> = std::iter::once(asset.reference())
            .chain(std::iter::once(asset.comment.as_str()))
            .chain(asset.tags.iter().map(String::as_str))
            .map(str::to_lowercase)
            .collect();
        self.0.iter().all(|term| {
            let found = haystacks.iter().any(|h| h.contains(&term.text));
            found != term.negated
        })
    }
}

impl QueryPredicate for TermPredicate {
    fn compile(&self, query: &str) -> Result<Box<dyn CompiledQuery>, AhubError> {
        Ok(Box::new(Terms(parse_terms(query)?)))
    }
}

fn parse_terms(query: &str) -> Result<Vec<Term>, AhubError> {
    let mut terms = Vec::new();
    let mut chars = query.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };
        let negated = first == '-';
        if negated {
            chars.next();
        }
        let mut text = String::new();
        if chars.next_if_eq(&'"').is_some() {
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                text.push(c);
            }
            if !closed {
                return Err(AhubError::Corrupt(format!(
                    "unterminated phrase in query {query:?}"
                )));
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                text.push(c);
            }
        }
        if text.is_empty() {
            if negated {
                return Err(AhubError::Corrupt(format!(
                    "dangling negation in query {query:?}"
                )));
            }
            continue;
        }
        terms.push(Term {
            text: text.to_lowercase(),
            negated,
        });
    }
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahub_core::AssetDraft;

    fn forest() -> Asset {
        let mut asset = Asset::new(
            "/assets/maps/Forest.level",
            AssetDraft::default().tags(["Outdoor", "night"]),
            "t",
        );
        asset.comment = "Dense pine woods".into();
        asset
    }

    fn matches(query: &str) -> bool {
        TermPredicate.compile(query).unwrap().matches(&forest())
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(matches(""));
        assert!(matches("   "));
    }

    #[test]
    fn terms_are_case_insensitive_and_conjunctive() {
        assert!(matches("forest"));
        assert!(matches("PINE outdoor"));
        assert!(!matches("forest desert"));
    }

    #[test]
    fn phrases_and_negation() {
        assert!(matches("\"pine woods\""));
        assert!(!matches("\"woods pine\""));
        assert!(matches("-desert"));
        assert!(!matches("-night"));
    }

    #[test]
    fn malformed_queries_are_corrupt() {
        let err = TermPredicate.compile("\"open").err().unwrap();
        assert_eq!(err.kind(), ahub_core::ErrorKind::Corrupt);
        assert!(TermPredicate.compile("a - b").is_err());
    }
}
