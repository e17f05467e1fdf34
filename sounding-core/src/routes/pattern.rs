//! Route path normalization and segment matching.

use std::fmt;

/// One `/`-delimited piece of a route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Fixed text, kept as written.
    Literal(String),
    /// A dynamic segment; `*` for wildcards.
    Param(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if raw.starts_with('*') {
            return Self::Param("*".to_string());
        }
        if let Some(name) = raw.strip_prefix(':') {
            return Self::Param(name.trim_end_matches(['?', '+', '*']).to_string());
        }
        if let Some(inner) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            // `{id}` and `{id:int}`
            let name = inner.split(':').next().unwrap_or(inner);
            return Self::Param(name.trim_start_matches('*').to_string());
        }
        if let Some(inner) = raw.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            // `<id>` and `<int:id>`
            let name = inner.rsplit(':').next().unwrap_or(inner);
            return Self::Param(name.to_string());
        }
        if let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            // `[id]` and `[...slug]`
            return Self::Param(inner.trim_start_matches('.').to_string());
        }
        Self::Literal(raw.to_string())
    }

    fn folded(&self) -> Option<String> {
        match self {
            Self::Literal(text) => Some(
                text.chars()
                    .filter(|ch| *ch != '-' && *ch != '_')
                    .flat_map(char::to_lowercase)
                    .collect(),
            ),
            Self::Param(_) => None,
        }
    }
}

/// A normalized route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Normalize a raw route path.
    ///
    /// Query strings and fragments are dropped, repeated and trailing slashes
    /// collapse, and every dynamic segment convention becomes a
    /// [`Segment::Param`].
    pub fn parse(raw: &str) -> Self {
        let path = raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(Segment::parse)
            .collect();
        Self { segments }
    }

    /// The normalized segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Join `self` in front of `child`.
    pub fn join(&self, child: &PathPattern) -> PathPattern {
        let mut segments = self.segments.clone();
        segments.extend(child.segments.iter().cloned());
        PathPattern { segments }
    }

    /// Key used for duplicate detection: folded literals, anonymous params.
    pub fn shape(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut shape = String::new();
        for segment in &self.segments {
            shape.push('/');
            match segment.folded() {
                Some(text) => shape.push_str(&text),
                None => shape.push('*'),
            }
        }
        shape
    }

    /// Remove the first matching prefix, compared segment-wise.
    pub fn strip_prefix(&self, prefixes: &[PathPattern]) -> PathPattern {
        for prefix in prefixes {
            let len = prefix.segments.len();
            if len == 0 || len > self.segments.len() {
                continue;
            }
            let matches = prefix
                .segments
                .iter()
                .zip(&self.segments)
                .all(|(a, b)| a.folded().is_some() && a.folded() == b.folded());
            if matches {
                return PathPattern {
                    segments: self.segments[len..].to_vec(),
                };
            }
        }
        self.clone()
    }

    /// Number of literal agreements when `self` and `other` are equivalent.
    ///
    /// Segment counts must be equal. Literals must agree; a parameter on
    /// either side matches anything.
    pub fn literal_agreements(&self, other: &PathPattern) -> Option<usize> {
        if self.segments.len() != other.segments.len() {
            return None;
        }
        let mut agreements = 0;
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match (a.folded(), b.folded()) {
                (Some(left), Some(right)) if left == right => agreements += 1,
                (Some(_), Some(_)) => return None,
                _ => {}
            }
        }
        Some(agreements)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => write!(f, "/{text}")?,
                Segment::Param(name) if name == "*" => f.write_str("/*")?,
                Segment::Param(name) => write!(f, "/:{name}")?,
            }
        }
        Ok(())
    }
}
