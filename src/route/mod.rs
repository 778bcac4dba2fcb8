//! Procedure -> route compilation
//!
//! The naming convention gives a procedure its method and path; its
//! documentation comment supplies parameter bindings, guards and hooks. The
//! result is a `RouteTable` value handed to the HTTP layer in one piece.

pub mod compiler;
pub mod error;
pub mod guard;
pub mod hook;
pub mod naming;
pub mod table;

pub use compiler::RouteCompiler;
pub use error::{CompileError, CompileErrors, RegistrationError};
pub use guard::{CompiledGuard, Guard, GuardFactory, GuardRegistry};
pub use hook::{CompiledHook, FnHook, Hook, HookChains, HookPhase, HookRegistry};
pub use naming::{HttpMethod, NamingConvention, NamingError, RouteShape};
pub use table::{PreValidationStep, RouteDescriptor, RouteSpec, RouteTable};
