//! The rule tag embedded in an iptables comment.
//!
//! Grammar: `SWITCHEROO:ns=<namespace>:port=<port>:pid=<pid>`.
//!
//! The whole comment must fit iptables' 256 byte limit, which is why the
//! namespace is capped at [`NAMESPACE_MAX_LEN`] bytes.

use std::fmt;

use thiserror::Error;

/// Marker every tag starts with.
pub const TAG_PREFIX: &str = "SWITCHEROO:";

/// Longest namespace accepted, in bytes.
pub const NAMESPACE_MAX_LEN: usize = 180;

/// A tag that failed to parse even though it carried our namespace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid rule number {0:?}")]
    RuleNumber(String),

    #[error("invalid port {0:?}")]
    Port(String),

    #[error("invalid pid {0:?}")]
    Pid(String),

    #[error("malformed tag {0:?}")]
    Malformed(String),
}

/// Fields carried by a rule comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTag {
    pub namespace: String,
    pub port: u16,
    pub pid: u32,
}

impl RuleTag {
    pub fn new(namespace: impl Into<String>, port: u16, pid: u32) -> Self {
        Self { namespace: namespace.into(), port, pid }
    }
}

impl fmt::Display for RuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns={}:port={}:pid={}", TAG_PREFIX, self.namespace, self.port, self.pid)
    }
}

/// A listing line that carried a tag for the namespace being scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedLine {
    pub rule_number: u32,
    pub port: u16,
    pub pid: u32,
}

/// Matches listing lines against one namespace's tag.
#[derive(Debug, Clone)]
pub struct TagMatcher {
    needle: String,
}

impl TagMatcher {
    pub fn new(namespace: &str) -> Self {
        Self { needle: format!("{}ns={}:port=", TAG_PREFIX, namespace) }
    }

    /// Parse one line of `iptables -L --line-numbers` output.
    ///
    /// Returns `Ok(None)` for lines without our tag: headers, foreign rules
    /// and other namespaces (including ones sharing our name as a prefix).
    pub fn parse_line(&self, line: &str) -> Result<Option<TaggedLine>, ParseError> {
        let Some(at) = line.find(&self.needle) else {
            return Ok(None);
        };

        let rule_number = leading_token(line)
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ParseError::RuleNumber(leading_token(line).to_string()))?;

        let rest = &line[at + self.needle.len()..];
        let (port, rest) = rest
            .split_once(':')
            .ok_or_else(|| ParseError::Malformed(tag_text(line, at).to_string()))?;
        let port = port.parse::<u16>().map_err(|_| ParseError::Port(port.to_string()))?;

        let pid = rest
            .strip_prefix("pid=")
            .ok_or_else(|| ParseError::Malformed(tag_text(line, at).to_string()))?;
        let pid = field_token(pid);
        let pid = pid.parse::<u32>().map_err(|_| ParseError::Pid(pid.to_string()))?;

        Ok(Some(TaggedLine { rule_number, port, pid }))
    }
}

fn leading_token(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// A field ends at whitespace or at the `*/` closing the comment.
fn field_token(s: &str) -> &str {
    let end = s.find(|c: char| c.is_whitespace() || c == '*').unwrap_or(s.len());
    &s[..end]
}

fn tag_text(line: &str, at: usize) -> &str {
    field_token(&line[at..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Chain PREROUTING (policy ACCEPT)";
    const COLUMNS: &str =
        "num  target     prot opt source               destination";

    fn listing_line(num: &str, tag: &str) -> String {
        format!(
            "{num}    REDIRECT   tcp  --  0.0.0.0/0            0.0.0.0/0            tcp dpt:9999 /* {tag} */ redir ports 40401"
        )
    }

    #[test]
    fn formats_tag() {
        let tag = RuleTag::new("web", 40401, 1234);
        assert_eq!(tag.to_string(), "SWITCHEROO:ns=web:port=40401:pid=1234");
    }

    #[test]
    fn parses_own_namespace() {
        let matcher = TagMatcher::new("web");
        let line = listing_line("3", "SWITCHEROO:ns=web:port=40401:pid=1234");

        let parsed = matcher.parse_line(&line).unwrap().unwrap();
        assert_eq!(parsed, TaggedLine { rule_number: 3, port: 40401, pid: 1234 });
    }

    #[test]
    fn parses_formatted_tag() {
        let tag = RuleTag::new("api", 40499, 7);
        let line = listing_line("12", &tag.to_string());

        let parsed = TagMatcher::new("api").parse_line(&line).unwrap().unwrap();
        assert_eq!((parsed.port, parsed.pid), (40499, 7));
    }

    #[test]
    fn skips_headers_and_foreign_rules() {
        let matcher = TagMatcher::new("web");
        assert_eq!(matcher.parse_line(HEADER).unwrap(), None);
        assert_eq!(matcher.parse_line(COLUMNS).unwrap(), None);
        assert_eq!(matcher.parse_line("").unwrap(), None);

        let foreign = "1    DNAT       tcp  --  0.0.0.0/0   0.0.0.0/0   tcp dpt:80 to:10.0.0.2:8080";
        assert_eq!(matcher.parse_line(foreign).unwrap(), None);
    }

    #[test]
    fn never_crosses_namespaces() {
        let matcher = TagMatcher::new("web");
        let other = listing_line("1", "SWITCHEROO:ns=api:port=40401:pid=1");
        let longer = listing_line("2", "SWITCHEROO:ns=webapp:port=40401:pid=1");

        assert_eq!(matcher.parse_line(&other).unwrap(), None);
        assert_eq!(matcher.parse_line(&longer).unwrap(), None);
    }

    #[test]
    fn malformed_numbers_are_fatal() {
        let matcher = TagMatcher::new("web");

        let bad_port = listing_line("1", "SWITCHEROO:ns=web:port=99999:pid=1");
        assert_eq!(matcher.parse_line(&bad_port), Err(ParseError::Port("99999".into())));

        let bad_pid = listing_line("1", "SWITCHEROO:ns=web:port=40400:pid=12x");
        assert_eq!(matcher.parse_line(&bad_pid), Err(ParseError::Pid("12x".into())));

        let bad_num = listing_line("x1", "SWITCHEROO:ns=web:port=40400:pid=12");
        assert_eq!(matcher.parse_line(&bad_num), Err(ParseError::RuleNumber("x1".into())));

        let zero = listing_line("0", "SWITCHEROO:ns=web:port=40400:pid=12");
        assert!(matches!(matcher.parse_line(&zero), Err(ParseError::RuleNumber(_))));
    }

    #[test]
    fn missing_pid_field_is_malformed() {
        let matcher = TagMatcher::new("web");
        let line = listing_line("1", "SWITCHEROO:ns=web:port=40400:owner=12");
        assert!(matches!(matcher.parse_line(&line), Err(ParseError::Malformed(_))));
    }
}
