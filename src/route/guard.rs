//! Request gates that run in the pre-validation chain, after the auth context
//! has been populated

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::ApiError;

use super::error::RegistrationError;

pub trait Guard: Send + Sync {
    /// Reject the request with the error to send, or let it through
    fn check(&self, request: &RequestContext) -> Result<(), ApiError>;
}

/// Builds a guard from its `@guard` arguments; returns a reason when the
/// arguments make no sense for this guard
pub type GuardFactory = Arc<dyn Fn(&[String]) -> Result<Arc<dyn Guard>, String> + Send + Sync>;

/// A guard bound to one route
#[derive(Clone)]
pub struct CompiledGuard {
    pub name: String,
    pub args: Vec<String>,
    pub guard: Arc<dyn Guard>,
}

impl CompiledGuard {
    /// `role(admin,editor)` style label used in route listings
    pub fn label(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{}({})", self.name, self.args.join(","))
        }
    }
}

impl fmt::Debug for CompiledGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGuard")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

impl PartialEq for CompiledGuard {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args
    }
}

#[derive(Clone, Default)]
pub struct GuardRegistry {
    factories: BTreeMap<String, GuardFactory>,
}

impl fmt::Debug for GuardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut factories: BTreeMap<String, GuardFactory> = BTreeMap::new();
        factories.insert("authenticated".into(), factory(|args| {
            no_args("authenticated", args)?;
            Ok(Arc::new(Authenticated))
        }));
        factories.insert("authorized".into(), factory(|args| {
            no_args("authorized", args)?;
            Ok(Arc::new(Authorized))
        }));
        factories.insert("role".into(), factory(|args| {
            some_args("role", args)?;
            Ok(Arc::new(AnyRole(args.to_vec())))
        }));
        factories.insert("permission".into(), factory(|args| {
            some_args("permission", args)?;
            Ok(Arc::new(AllPermissions(args.to_vec())))
        }));
        Self { factories }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistrationError>
    where
        F: Fn(&[String]) -> Result<Arc<dyn Guard>, String> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistrationError::Duplicate { kind: "guard", name });
        }
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// `None` when no guard of that name is registered
    pub fn build(&self, name: &str, args: &[String]) -> Option<Result<CompiledGuard, String>> {
        let factory = self.factories.get(name)?;
        Some(factory(args).map(|guard| CompiledGuard {
            name: name.to_string(),
            args: args.to_vec(),
            guard,
        }))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

fn factory<F>(f: F) -> GuardFactory
where
    F: Fn(&[String]) -> Result<Arc<dyn Guard>, String> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn no_args(name: &str, args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(format!("'{}' takes no arguments", name))
    }
}

fn some_args(name: &str, args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        Err(format!("'{}' needs at least one argument", name))
    } else {
        Ok(())
    }
}

struct Authenticated;

impl Guard for Authenticated {
    fn check(&self, request: &RequestContext) -> Result<(), ApiError> {
        if request.auth.authenticated {
            Ok(())
        } else {
            Err(ApiError::unauthorized("Authentication required"))
        }
    }
}

struct Authorized;

impl Guard for Authorized {
    fn check(&self, request: &RequestContext) -> Result<(), ApiError> {
        Authenticated.check(request)?;
        if request.auth.authorized {
            Ok(())
        } else {
            Err(ApiError::forbidden("Credential is not accepted by this service"))
        }
    }
}

struct AnyRole(Vec<String>);

impl Guard for AnyRole {
    fn check(&self, request: &RequestContext) -> Result<(), ApiError> {
        Authenticated.check(request)?;
        let roles = request.auth.roles();
        if self.0.iter().any(|wanted| roles.contains(&wanted.as_str())) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Requires one of roles: {}", self.0.join(", "))))
        }
    }
}

struct AllPermissions(Vec<String>);

impl Guard for AllPermissions {
    fn check(&self, request: &RequestContext) -> Result<(), ApiError> {
        Authenticated.check(request)?;
        let granted = request.auth.permissions();
        let missing: Vec<&str> = self
            .0
            .iter()
            .map(String::as_str)
            .filter(|p| !granted.contains(p))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Missing permissions: {}", missing.join(", "))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthContext;
    use serde_json::{json, Map};

    fn request_with(claims: serde_json::Value) -> RequestContext {
        let mut request = RequestContext::new("GET", "/");
        let user: Map<String, serde_json::Value> = claims.as_object().cloned().unwrap_or_default();
        request.auth = AuthContext {
            authenticated: true,
            authorized: true,
            user: Some(user),
        };
        request
    }

    fn guard(name: &str, args: &[&str]) -> CompiledGuard {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        GuardRegistry::with_builtins().build(name, &args).unwrap().unwrap()
    }

    #[test]
    fn anonymous_requests_are_unauthorized() {
        let request = RequestContext::new("GET", "/");
        let err = guard("authenticated", &[]).guard.check(&request).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn authorized_needs_audience() {
        let mut request = request_with(json!({}));
        request.auth.authorized = false;
        let err = guard("authorized", &[]).guard.check(&request).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn role_is_any_of() {
        let request = request_with(json!({ "roles": ["editor"] }));
        assert!(guard("role", &["admin", "editor"]).guard.check(&request).is_ok());
        assert!(guard("role", &["admin"]).guard.check(&request).is_err());
    }

    #[test]
    fn permission_is_all_of() {
        let request = request_with(json!({ "permissions": ["posts:read"] }));
        assert!(guard("permission", &["posts:read"]).guard.check(&request).is_ok());
        let err = guard("permission", &["posts:read", "posts:write"])
            .guard
            .check(&request)
            .unwrap_err();
        assert_eq!(err.message(), "Missing permissions: posts:write");
    }

    #[test]
    fn factories_validate_arguments() {
        let registry = GuardRegistry::with_builtins();
        assert!(registry.build("role", &[]).unwrap().is_err());
        assert!(registry.build("authenticated", &["x".into()]).unwrap().is_err());
        assert!(registry.build("nope", &[]).is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = GuardRegistry::with_builtins();
        let err = registry
            .register("role", |_: &[String]| Ok(Arc::new(Authenticated) as Arc<dyn Guard>))
            .unwrap_err();
        assert!(err.to_string().contains("role"));
    }

    #[test]
    fn labels_include_arguments() {
        assert_eq!(guard("role", &["admin", "editor"]).label(), "role(admin,editor)");
        assert_eq!(guard("authenticated", &[]).label(), "authenticated");
    }
}
