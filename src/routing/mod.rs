//! Route compilation: trigger matching and message pattern rendering.

pub mod route;
pub mod template;

pub use route::{compile_routes, CompiledRoute, RouteMatch};
pub use template::{Template, TemplateContext};
