use std::fmt;

/// A titled text artifact. Renders as `title`, a blank line, then `body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub title: String,
    pub body: String,
}

impl Report {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
    /// Inverse of the `Display` rendering.
    pub fn parse(text: &str) -> Option<Self> {
        let (title, body) = text.split_once("\n\n")?;
        Some(Self::new(title, body))
    }
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.body.lines()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n{}", self.title, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_with_blank_lines_survives_rendering() {
        let report = Report::new("Compliance Summary", "Shipments: 2\n\nship_1 | CREATED\n");
        assert_eq!(Report::parse(&report.to_string()), Some(report));
    }

    #[test]
    fn parse_needs_a_separator() {
        assert!(Report::parse("just a title").is_none());
    }
}
