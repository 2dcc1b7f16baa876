use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// 字段路径中的一段
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// 结构化的字段路径，例如 `experiences.0.highlights.1`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self(vec![Segment::Field(name.into())])
    }

    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.0.push(Segment::Field(name.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push(Segment::Index(index));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                Segment::Field(name) => f.write_str(name)?,
                Segment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

/// 路径解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid field path: {0}")]
pub struct ParsePathError(String);

impl FromStr for FieldPath {
    type Err = ParsePathError;

    /// 同时接受 `a.0.b` 和 `a[0].b` 两种写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        if s.is_empty() {
            return Ok(Self(segments));
        }

        for part in s.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };

            if name.is_empty() && rest.is_empty() {
                return Err(ParsePathError(s.to_string()));
            }

            if !name.is_empty() {
                match name.parse::<usize>() {
                    Ok(index) => segments.push(Segment::Index(index)),
                    Err(_) => segments.push(Segment::Field(name.to_string())),
                }
            }

            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| ParsePathError(s.to_string()))?;
                let index = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| ParsePathError(s.to_string()))?;
                segments.push(Segment::Index(index));

                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(ParsePathError(s.to_string()));
                }
            }
        }

        Ok(Self(segments))
    }
}

impl From<&str> for FieldPath {
    fn from(name: &str) -> Self {
        Self::field(name)
    }
}
