use serde::{Deserialize, Serialize};

/// How the extractor reacts to a comment it cannot fully parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataMode {
    /// Unterminated comments and malformed tags are errors
    #[default]
    Strict,
    /// Offending tags (or the whole comment) are skipped with a warning
    Lenient,
}

impl std::str::FromStr for MetadataMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(MetadataMode::Strict),
            "lenient" => Ok(MetadataMode::Lenient),
            other => Err(format!("unknown metadata mode '{}'", other)),
        }
    }
}

/// `@param {source} name<alias> schema-expression`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamTag {
    /// Raw binding source, e.g. `querystring` or `user`
    pub source: String,
    /// Raw name, possibly in `name<alias>` form
    pub name: String,
    pub description: String,
    pub line: usize,
}

/// `@guard name, arg1, arg2`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardTag {
    pub name: String,
    pub args: Vec<String>,
    pub line: usize,
}

/// `@hooks phase fn1, fn2` (the phase may also be written as `{phase}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HooksTag {
    pub phase: String,
    pub functions: Vec<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
pub enum Tag {
    Param(ParamTag),
    Guard(GuardTag),
    Hooks(HooksTag),
}

impl Tag {
    pub fn line(&self) -> usize {
        match self {
            Tag::Param(t) => t.line,
            Tag::Guard(t) => t.line,
            Tag::Hooks(t) => t.line,
        }
    }
}

/// Everything extracted from a procedure's documentation comment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocComment {
    /// Free text before the first tag
    pub summary: String,
    pub tags: Vec<Tag>,
}

impl DocComment {
    pub fn params(&self) -> impl Iterator<Item = &ParamTag> {
        self.tags.iter().filter_map(|t| match t {
            Tag::Param(p) => Some(p),
            _ => None,
        })
    }

    pub fn guards(&self) -> impl Iterator<Item = &GuardTag> {
        self.tags.iter().filter_map(|t| match t {
            Tag::Guard(g) => Some(g),
            _ => None,
        })
    }

    pub fn hooks(&self) -> impl Iterator<Item = &HooksTag> {
        self.tags.iter().filter_map(|t| match t {
            Tag::Hooks(h) => Some(h),
            _ => None,
        })
    }
}
