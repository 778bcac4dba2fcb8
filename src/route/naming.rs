//! Procedure name -> (method, path) convention
//!
//! `api_get_hello__world` is `GET /hello/world`, and
//! `api_post_user.id.__update_profile` is `POST /user/:id/update-profile`.
//! After the prefix, the first `_` separates the method from the path; the
//! segment separator (`__`) splits path segments; `.name.` is a path
//! parameter; remaining single underscores become hyphens.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            other => return Err(other.to_string()),
        })
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("name does not start with '{0}'")]
    MissingPrefix(String),

    #[error("name has no HTTP method segment")]
    MissingMethod,

    #[error("'{0}' is not an HTTP method")]
    UnknownMethod(String),

    #[error("path parameter in '{0}' is not closed with '.'")]
    UnclosedParam(String),

    #[error("empty path parameter in '{0}'")]
    EmptyParam(String),
}

/// Route shape derived from a procedure name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteShape {
    pub method: HttpMethod,
    pub path: String,
    /// Path parameter names in path order
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConvention {
    pub prefix: String,
    pub segment_separator: String,
    pub hyphenate: bool,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            prefix: "api_".to_string(),
            segment_separator: "__".to_string(),
            hyphenate: true,
        }
    }
}

impl NamingConvention {
    pub fn derive(&self, name: &str) -> Result<RouteShape, NamingError> {
        let rest = name
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| NamingError::MissingPrefix(self.prefix.clone()))?;

        let (method, remainder) = match rest.find('_') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };
        if method.is_empty() {
            return Err(NamingError::MissingMethod);
        }
        let method: HttpMethod = method.parse().map_err(NamingError::UnknownMethod)?;

        let mut pieces = Vec::new();
        let mut params = Vec::new();
        if !remainder.is_empty() {
            let segments: Vec<&str> = if self.segment_separator.is_empty() {
                vec![remainder]
            } else {
                remainder.split(self.segment_separator.as_str()).collect()
            };
            for segment in segments {
                self.render_segment(segment, &mut pieces, &mut params)?;
            }
        }

        Ok(RouteShape {
            method,
            path: format!("/{}", pieces.join("/")),
            params,
        })
    }

    fn render_segment(
        &self,
        segment: &str,
        pieces: &mut Vec<String>,
        params: &mut Vec<String>,
    ) -> Result<(), NamingError> {
        let mut rest = segment;

        while let Some(start) = rest.find('.') {
            self.push_literal(&rest[..start], pieces);

            let after = &rest[start + 1..];
            let end = after
                .find('.')
                .ok_or_else(|| NamingError::UnclosedParam(segment.to_string()))?;
            let param = &after[..end];
            if param.is_empty() {
                return Err(NamingError::EmptyParam(segment.to_string()));
            }

            pieces.push(format!(":{}", param));
            params.push(param.to_string());
            rest = &after[end + 1..];
        }

        self.push_literal(rest, pieces);
        Ok(())
    }

    fn push_literal(&self, text: &str, pieces: &mut Vec<String>) {
        if text.is_empty() {
            return;
        }
        let rendered = if self.hyphenate {
            text.replace('_', "-")
        } else {
            text.to_string()
        };
        pieces.push(rendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(name: &str) -> (String, String) {
        let shape = NamingConvention::default().derive(name).unwrap();
        (shape.method.to_string(), shape.path)
    }

    #[test]
    fn documented_examples() {
        assert_eq!(derive("api_get_hello__world"), ("GET".into(), "/hello/world".into()));
        assert_eq!(
            derive("api_post_user.id.__update_profile"),
            ("POST".into(), "/user/:id/update-profile".into())
        );
    }

    #[test]
    fn params_keep_underscores_and_split_segments() {
        let shape = NamingConvention::default()
            .derive("api_delete_users.user_id.posts.post_id.")
            .unwrap();
        assert_eq!(shape.method, HttpMethod::Delete);
        assert_eq!(shape.path, "/users/:user_id/posts/:post_id");
        assert_eq!(shape.params, vec!["user_id", "post_id"]);
    }

    #[test]
    fn bare_method_is_root() {
        assert_eq!(derive("api_get"), ("GET".into(), "/".into()));
        assert_eq!(derive("api_patch_.id."), ("PATCH".into(), "/:id".into()));
    }

    #[test]
    fn hyphenation_can_be_disabled() {
        let naming = NamingConvention {
            hyphenate: false,
            ..Default::default()
        };
        assert_eq!(naming.derive("api_put_user_profile").unwrap().path, "/user_profile");
    }

    #[test]
    fn custom_prefix() {
        let naming = NamingConvention {
            prefix: "http_".into(),
            ..Default::default()
        };
        assert_eq!(naming.derive("http_get_status").unwrap().path, "/status");
        assert_eq!(
            naming.derive("api_get_status").unwrap_err(),
            NamingError::MissingPrefix("http_".into())
        );
    }

    #[test]
    fn rejects_bad_names() {
        let naming = NamingConvention::default();
        assert_eq!(naming.derive("api__x").unwrap_err(), NamingError::MissingMethod);
        assert_eq!(naming.derive("api_fetch_x").unwrap_err(), NamingError::UnknownMethod("FETCH".into()));
        assert!(matches!(naming.derive("api_get_user.id"), Err(NamingError::UnclosedParam(_))));
        assert!(matches!(naming.derive("api_get_user.."), Err(NamingError::EmptyParam(_))));
    }

    #[test]
    fn derivation_is_deterministic() {
        let naming = NamingConvention::default();
        let name = "api_post_user.id.__update_profile";
        assert_eq!(naming.derive(name), naming.derive(name));
    }
}
