use serde::Serialize;
use serde_json::Value;

use crate::context::RequestContext;
use crate::schema::Section;

/// Where a procedure argument is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    Querystring,
    Params,
    Body,
    Headers,
    /// Claim of the authenticated identity; not validated
    User,
    /// Value a hook left in the request side channel; not validated
    Request,
}

impl ParamSource {
    /// Input section validated for this source, if any
    pub fn section(&self) -> Option<Section> {
        match self {
            ParamSource::Querystring => Some(Section::Querystring),
            ParamSource::Params => Some(Section::Params),
            ParamSource::Body => Some(Section::Body),
            ParamSource::Headers => Some(Section::Headers),
            ParamSource::User | ParamSource::Request => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamSource::Querystring => "querystring",
            ParamSource::Params => "params",
            ParamSource::Body => "body",
            ParamSource::Headers => "headers",
            ParamSource::User => "user",
            ParamSource::Request => "request",
        }
    }
}

impl std::str::FromStr for ParamSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "querystring" | "query" => ParamSource::Querystring,
            "params" => ParamSource::Params,
            "body" => ParamSource::Body,
            "headers" => ParamSource::Headers,
            "user" => ParamSource::User,
            "request" => ParamSource::Request,
            other => return Err(other.to_string()),
        })
    }
}

/// Compiled mapping from one declared procedure parameter to a request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterBinding {
    pub name: String,
    pub alias: String,
    pub source: ParamSource,
}

impl ParameterBinding {
    /// Field value for this binding; absent fields come back as `null`
    pub fn extract(&self, request: &RequestContext) -> Value {
        let found = match self.source {
            ParamSource::Querystring => request.query.get(&self.alias),
            ParamSource::Params => request.params.get(&self.alias),
            ParamSource::Body => request.body.as_object().and_then(|body| body.get(&self.alias)),
            ParamSource::Headers => request.headers.get(&self.alias.to_ascii_lowercase()),
            ParamSource::User => request.auth.claim(&self.alias),
            ParamSource::Request => request.locals.get(&self.alias),
        };
        found.cloned().unwrap_or(Value::Null)
    }
}

/// Split `name<alias>` into its parts; a bare `name` is its own alias.
/// `None` when the brackets are unbalanced or either part is empty.
pub fn split_alias(raw: &str) -> Option<(String, String)> {
    let raw = raw.trim();
    let (name, alias) = match raw.find('<') {
        Some(open) => {
            let alias = raw[open + 1..].strip_suffix('>')?;
            (&raw[..open], alias)
        }
        None => (raw, raw),
    };

    let valid = |s: &str| !s.is_empty() && !s.contains(|c: char| c == '<' || c == '>' || c.is_whitespace());
    if valid(name) && valid(alias) {
        Some((name.to_string(), alias.to_string()))
    } else {
        None
    }
}
