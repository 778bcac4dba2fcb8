use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{Procedure, ProcedureCatalog};
use crate::config::AppConfig;
use crate::invoker::{split_alias, ParamSource, ParameterBinding, ProcedureHandler, DEFAULT_APP_ERROR_STATE};
use crate::metadata::{DocComment, MetadataExtractor, MetadataMode};
use crate::schema::{
    CompiledSchema, CustomValidators, RegistryError, SchemaCompiler, SchemaError, Section, SectionError,
};

use super::error::{CompileError, CompileErrors};
use super::guard::GuardRegistry;
use super::hook::{CompiledHook, HookChains, HookPhase, HookRegistry};
use super::naming::{NamingConvention, RouteShape};
use super::table::{PreValidationStep, RouteSpec, RouteTable};

/// Turns procedures into routes. Runs once at startup; everything it
/// produces is immutable afterwards.
#[derive(Debug, Clone)]
pub struct RouteCompiler {
    naming: NamingConvention,
    extractor: MetadataExtractor,
    validators: CustomValidators,
    guards: GuardRegistry,
    hooks: HookRegistry,
    app_error_state: String,
}

impl RouteCompiler {
    /// Compiler with empty registries and strict metadata
    pub fn new(naming: NamingConvention) -> Self {
        Self {
            naming,
            extractor: MetadataExtractor::new(MetadataMode::Strict),
            validators: CustomValidators::new(),
            guards: GuardRegistry::new(),
            hooks: HookRegistry::new(),
            app_error_state: DEFAULT_APP_ERROR_STATE.to_string(),
        }
    }

    /// Built-in guards, hooks and validators, plus the configured validators directory
    pub fn from_config(config: &AppConfig) -> Result<Self, RegistryError> {
        let mut validators = CustomValidators::with_builtins()?;
        if let Some(dir) = &config.routes.validators_dir {
            validators.load_dir(dir)?;
        }

        Ok(Self::new(config.routes.naming())
            .with_metadata_mode(config.routes.metadata_mode)
            .with_validators(validators)
            .with_guards(GuardRegistry::with_builtins())
            .with_hooks(HookRegistry::with_builtins())
            .with_app_error_state(config.database.app_error_state.clone()))
    }

    pub fn with_metadata_mode(mut self, mode: MetadataMode) -> Self {
        self.extractor = MetadataExtractor::new(mode);
        self
    }

    pub fn with_validators(mut self, validators: CustomValidators) -> Self {
        self.validators = validators;
        self
    }

    pub fn with_guards(mut self, guards: GuardRegistry) -> Self {
        self.guards = guards;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_app_error_state(mut self, state: impl Into<String>) -> Self {
        self.app_error_state = state.into();
        self
    }

    pub fn naming(&self) -> &NamingConvention {
        &self.naming
    }

    pub fn validators(&self) -> &CustomValidators {
        &self.validators
    }

    pub fn guards(&self) -> &GuardRegistry {
        &self.guards
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Compile every procedure, collecting all failures
    pub fn compile_catalog(&self, catalog: &ProcedureCatalog) -> Result<RouteTable, CompileErrors> {
        let mut table = RouteTable::new();
        let mut errors = Vec::new();

        for procedure in catalog.iter() {
            let compiled = self
                .compile_procedure(procedure)
                .and_then(|route| table.insert(route));
            if let Err(err) = compiled {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            info!("Compiled {} routes", table.len());
            Ok(table)
        } else {
            Err(CompileErrors(errors))
        }
    }

    pub fn compile_procedure(&self, procedure: &Arc<Procedure>) -> Result<RouteSpec, CompileError> {
        let owner = procedure.name.as_str();

        let shape = self.naming.derive(owner).map_err(|source| CompileError::Naming {
            procedure: owner.to_string(),
            source,
        })?;
        let doc = self.extractor.extract(procedure).map_err(|source| CompileError::Metadata {
            procedure: owner.to_string(),
            source,
        })?;

        let (bindings, schema) = self.compile_params(procedure, &shape, &doc)?;
        let pre_validation = self.compile_guards(owner, &doc)?;
        let hooks = self.compile_hooks(owner, &doc)?;

        debug!("Compiled {} {} -> {}", shape.method, shape.path, owner);

        Ok(RouteSpec {
            method: shape.method,
            path: shape.path,
            summary: doc.summary,
            pre_validation,
            hooks,
            schema,
            handler: ProcedureHandler::new(procedure.clone(), bindings, self.app_error_state.clone()),
        })
    }

    fn compile_params(
        &self,
        procedure: &Procedure,
        shape: &RouteShape,
        doc: &DocComment,
    ) -> Result<(BTreeMap<String, ParameterBinding>, CompiledSchema), CompileError> {
        let owner = || procedure.name.clone();
        let compiler = SchemaCompiler::new(&self.validators);
        let mut bindings: BTreeMap<String, ParameterBinding> = BTreeMap::new();
        let mut schema = CompiledSchema::new();

        for tag in doc.params() {
            let (name, alias) = split_alias(&tag.name).ok_or_else(|| CompileError::InvalidParamName {
                procedure: owner(),
                raw: tag.name.clone(),
            })?;

            let source: ParamSource = tag.source.parse().map_err(|_| CompileError::UnknownSource {
                procedure: owner(),
                parameter: name.clone(),
                source_name: tag.source.clone(),
            })?;

            if !procedure.parameters.contains(&name) {
                return Err(CompileError::UndeclaredParameter {
                    procedure: owner(),
                    parameter: name,
                });
            }
            if bindings.contains_key(&name) {
                return Err(CompileError::DuplicateBinding {
                    procedure: owner(),
                    parameter: name,
                });
            }

            if let Some(section) = source.section() {
                let node = compiler.compile(&tag.description).map_err(|source| CompileError::Schema {
                    procedure: owner(),
                    parameter: name.clone(),
                    source,
                })?;

                if section == Section::Params && !shape.params.contains(&alias) {
                    return Err(CompileError::PathParamMismatch {
                        procedure: owner(),
                        parameter: name,
                        alias,
                    });
                }

                schema.insert(section, &alias, node).map_err(|err| match err {
                    SectionError::DuplicateAlias(_) => CompileError::DuplicateAlias {
                        procedure: owner(),
                        section,
                        alias: alias.clone(),
                    },
                    SectionError::Rejected(reason) => CompileError::Schema {
                        procedure: owner(),
                        parameter: name.clone(),
                        source: SchemaError::IllFormed(reason),
                    },
                })?;
            }

            bindings.insert(name.clone(), ParameterBinding { name, alias, source });
        }

        if let Some(parameter) = procedure
            .parameters
            .iter()
            .find(|parameter| !bindings.contains_key(*parameter))
        {
            return Err(CompileError::MissingBinding {
                procedure: owner(),
                parameter: parameter.clone(),
            });
        }

        for param in &shape.params {
            let bound = bindings
                .values()
                .any(|b| b.source == ParamSource::Params && &b.alias == param);
            if !bound {
                warn!("Path parameter ':{}' of '{}' is not passed to the procedure", param, procedure.name);
            }
        }

        Ok((bindings, schema))
    }

    fn compile_guards(&self, owner: &str, doc: &DocComment) -> Result<Vec<PreValidationStep>, CompileError> {
        let mut chain = vec![PreValidationStep::AuthContext];

        for tag in doc.guards() {
            match self.guards.build(&tag.name, &tag.args) {
                Some(Ok(guard)) => chain.push(PreValidationStep::Guard(guard)),
                Some(Err(reason)) => {
                    return Err(CompileError::InvalidGuardArgs {
                        procedure: owner.to_string(),
                        guard: tag.name.clone(),
                        reason,
                    })
                }
                None => {
                    return Err(CompileError::UnknownGuard {
                        procedure: owner.to_string(),
                        guard: tag.name.clone(),
                    })
                }
            }
        }

        Ok(chain)
    }

    fn compile_hooks(&self, owner: &str, doc: &DocComment) -> Result<HookChains, CompileError> {
        let mut chains = HookChains::new();

        for tag in doc.hooks() {
            let phase: HookPhase = tag.phase.parse().map_err(|_| CompileError::UnknownHookPhase {
                procedure: owner.to_string(),
                phase: tag.phase.clone(),
            })?;
            if chains.contains(phase) {
                return Err(CompileError::DuplicateHookPhase {
                    procedure: owner.to_string(),
                    phase: tag.phase.clone(),
                });
            }

            let hooks = tag
                .functions
                .iter()
                .map(|name| {
                    self.hooks
                        .get(name)
                        .map(|hook| CompiledHook {
                            name: name.clone(),
                            hook: hook.clone(),
                        })
                        .ok_or_else(|| CompileError::UnknownHook {
                            procedure: owner.to_string(),
                            phase: tag.phase.clone(),
                            hook: name.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            chains.insert(phase, hooks);
        }

        Ok(chains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::guard::Guard;
    use serde_json::json;

    fn compiler() -> RouteCompiler {
        RouteCompiler::new(NamingConvention::default())
            .with_validators(CustomValidators::with_builtins().unwrap())
            .with_guards(GuardRegistry::with_builtins())
            .with_hooks(HookRegistry::with_builtins())
    }

    fn procedure(name: &str, params: &[&str], comment: &str) -> Arc<Procedure> {
        let definition = format!("BEGIN\n{}\nSELECT 1;\nEND", comment);
        Arc::new(Procedure::new(
            name,
            definition,
            params.iter().map(|p| p.to_string()).collect(),
        ))
    }

    #[test]
    fn compiles_a_documented_procedure() {
        let proc = procedure(
            "api_get_users.id.",
            &["p_id", "p_fields", "p_viewer"],
            r#"/**
              * Fetch one user
              * @param {params} p_id<id> Type.Integer({ minimum: 1 })
              * @param {querystring} p_fields<fields> Type.Optional(Type.String())
              * @param {user} p_viewer<sub> identity of the caller
              * @guard role, admin, support
              * @hooks preSerialization no_store
              */"#,
        );
        let route = compiler().compile_procedure(&proc).unwrap();

        assert_eq!(route.path, "/users/:id");
        assert_eq!(route.summary, "Fetch one user");
        assert_eq!(route.pre_validation.len(), 2);
        assert_eq!(route.pre_validation[0], PreValidationStep::AuthContext);
        assert_eq!(route.pre_validation[1].label(), "guard:role(admin,support)");
        assert_eq!(route.hooks.get(HookPhase::PreSerialization).len(), 1);

        let described = route.describe();
        assert_eq!(described.schema["params"]["required"], json!(["id"]));
        assert_eq!(described.schema["querystring"]["properties"]["fields"]["type"], "string");
        assert_eq!(
            described.parameters.iter().map(|b| b.alias.as_str()).collect::<Vec<_>>(),
            vec!["id", "fields", "sub"]
        );
    }

    #[test]
    fn guards_keep_comment_order_after_auth_context() {
        let mut guards = GuardRegistry::with_builtins();
        struct Open;
        impl Guard for Open {
            fn check(&self, _: &crate::context::RequestContext) -> Result<(), crate::error::ApiError> {
                Ok(())
            }
        }
        guards.register("open", |_: &[String]| Ok(Arc::new(Open) as Arc<dyn Guard>)).unwrap();

        let proc = procedure("api_get_x", &[], "/** @guard open\n * @guard authenticated */");
        let route = compiler().with_guards(guards).compile_procedure(&proc).unwrap();
        let labels: Vec<String> = route.pre_validation.iter().map(PreValidationStep::label).collect();
        assert_eq!(labels, vec!["auth-context", "guard:open", "guard:authenticated"]);
    }

    #[test]
    fn missing_binding_fails_compilation() {
        let proc = procedure("api_get_x", &["p_id", "p_page"], "/** @param {querystring} p_id<id> Type.Integer() */");
        let err = compiler().compile_procedure(&proc).unwrap_err();
        assert_eq!(
            err,
            CompileError::MissingBinding {
                procedure: "api_get_x".into(),
                parameter: "p_page".into()
            }
        );
    }

    #[test]
    fn unknown_validator_names_validator_and_parameter() {
        let proc = procedure("api_get_x", &["p_id"], "/** @param {querystring} p_id<id> Custom.isbn() */");
        let err = compiler().compile_procedure(&proc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("isbn"), "{}", msg);
        assert!(msg.contains("p_id"), "{}", msg);
        assert!(msg.contains("api_get_x"), "{}", msg);
    }

    #[test]
    fn unknown_source_is_fatal() {
        let proc = procedure("api_get_x", &["p_id"], "/** @param {cookie} p_id Type.String() */");
        assert!(matches!(
            compiler().compile_procedure(&proc),
            Err(CompileError::UnknownSource { ref source_name, .. }) if source_name == "cookie"
        ));
    }

    #[test]
    fn guard_and_hook_resolution_failures() {
        let c = compiler();
        let unknown_guard = procedure("api_get_x", &[], "/** @guard superuser */");
        assert!(matches!(c.compile_procedure(&unknown_guard), Err(CompileError::UnknownGuard { .. })));

        let bad_phase = procedure("api_get_x", &[], "/** @hooks beforeEverything no_store */");
        assert!(matches!(c.compile_procedure(&bad_phase), Err(CompileError::UnknownHookPhase { .. })));

        let twice = procedure(
            "api_get_x",
            &[],
            "/** @hooks onSend no_store\n * @hooks onSend log_request */",
        );
        assert!(matches!(c.compile_procedure(&twice), Err(CompileError::DuplicateHookPhase { .. })));

        let unknown_fn = procedure("api_get_x", &[], "/** @hooks onSend no_store, audit */");
        assert!(matches!(
            c.compile_procedure(&unknown_fn),
            Err(CompileError::UnknownHook { ref hook, .. }) if hook == "audit"
        ));
    }

    #[test]
    fn path_binding_must_exist_in_path() {
        let proc = procedure("api_get_users", &["p_id"], "/** @param {params} p_id<id> Type.Integer() */");
        assert!(matches!(
            compiler().compile_procedure(&proc),
            Err(CompileError::PathParamMismatch { .. })
        ));
    }

    #[test]
    fn compilation_is_idempotent() {
        let proc = procedure(
            "api_post_users",
            &["p_email", "p_tags"],
            "/** @param {body} p_email<email> Custom.email()\n * @param {body} p_tags<tags> Type.Array(Type.String(), { maxItems: 5 }) */",
        );
        let c = compiler();
        let first = c.compile_procedure(&proc).unwrap();
        let second = c.compile_procedure(&proc).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.describe(), second.describe());
    }

    #[test]
    fn catalog_collects_every_error() {
        let mut catalog = ProcedureCatalog::new();
        catalog.insert(Procedure::new("api_get_a", "/** @guard nope */", vec![]));
        catalog.insert(Procedure::new("api_get_b", "", vec!["p_x".into()]));
        catalog.insert(Procedure::new("api_get_c", "", vec![]));

        let errors = compiler().compile_catalog(&catalog).unwrap_err();
        let owners: Vec<&str> = errors.iter().map(CompileError::procedure).collect();
        assert_eq!(owners, vec!["api_get_a", "api_get_b"]);
    }
}
