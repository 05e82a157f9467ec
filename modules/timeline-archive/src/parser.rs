use regex::Regex;
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::types::{IdentifierSet, PostId};

/// Pulls post identifiers out of rendered markup. Only permalinks under the
/// bound handle count, so quoted or replied-to posts from other accounts are
/// ignored.
#[derive(Debug, Clone)]
pub struct IdentifierParser {
    pattern: Regex,
}

impl IdentifierParser {
    pub fn for_handle(handle: &str) -> Self {
        let pattern = Regex::new(&format!(
            r"(?i)/{}/status/([0-9]+)",
            regex::escape(handle)
        ))
        .expect("escaped handle always forms a valid regex");
        Self { pattern }
    }

    /// Every identifier linked from `content`.
    pub fn parse(&self, content: &str) -> IdentifierSet {
        self.pattern
            .captures_iter(content)
            .map(|cap| PostId::new(&cap[1]))
            .collect()
    }

    /// Parse per-post fragments. Stale fragments are skipped; any other read
    /// failure aborts the pass.
    pub fn parse_fragments<I>(&self, fragments: I) -> Result<IdentifierSet>
    where
        I: IntoIterator<Item = Result<String>>,
    {
        let mut ids = IdentifierSet::new();
        let mut stale = 0usize;
        for fragment in fragments {
            match fragment {
                Ok(html) => ids.extend(self.parse(&html)),
                Err(ScrapeError::StaleElement) => stale += 1,
                Err(e) => return Err(e),
            }
        }
        if stale > 0 {
            debug!(stale, "skipped stale post elements");
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> IdentifierSet {
        list.iter().map(|s| PostId::from(*s)).collect()
    }

    #[test]
    fn extracts_relative_and_absolute_permalinks() {
        let parser = IdentifierParser::for_handle("jack");
        let html = r#"
            <a href="/jack/status/20">a</a>
            <a href="https://twitter.com/jack/status/21/photo/1">b</a>
        "#;
        assert_eq!(parser.parse(html), ids(&["20", "21"]));
    }

    #[test]
    fn handle_match_is_case_insensitive() {
        let parser = IdentifierParser::for_handle("jack");
        assert_eq!(parser.parse(r#"<a href="/Jack/status/7">"#), ids(&["7"]));
    }

    #[test]
    fn other_accounts_are_ignored() {
        let parser = IdentifierParser::for_handle("bob");
        let html = r#"
            <a href="/jimbob/status/1">quoted</a>
            <a href="/alice/status/2">reply target</a>
            <a href="/bob/status/3">own</a>
        "#;
        assert_eq!(parser.parse(html), ids(&["3"]));
    }

    #[test]
    fn handle_metacharacters_are_escaped() {
        let parser = IdentifierParser::for_handle("a.b");
        assert!(parser.parse(r#"<a href="/axb/status/1">"#).is_empty());
        assert_eq!(parser.parse(r#"<a href="/a.b/status/1">"#), ids(&["1"]));
    }

    #[test]
    fn duplicate_links_collapse() {
        let parser = IdentifierParser::for_handle("jack");
        let html = r#"<a href="/jack/status/5"></a><a href="/jack/status/5/analytics"></a>"#;
        assert_eq!(parser.parse(html), ids(&["5"]));
    }

    #[test]
    fn stale_fragment_is_skipped() {
        let parser = IdentifierParser::for_handle("jack");
        let fragments = vec![
            Ok(r#"<a href="/jack/status/1">"#.to_string()),
            Err(ScrapeError::StaleElement),
            Ok(r#"<a href="/jack/status/2">"#.to_string()),
        ];
        assert_eq!(parser.parse_fragments(fragments).unwrap(), ids(&["1", "2"]));
    }

    #[test]
    fn non_stale_failure_propagates() {
        let parser = IdentifierParser::for_handle("jack");
        let fragments = vec![
            Ok(r#"<a href="/jack/status/1">"#.to_string()),
            Err(ScrapeError::Other(anyhow::anyhow!("connection dropped"))),
        ];
        assert!(parser.parse_fragments(fragments).is_err());
    }
}
