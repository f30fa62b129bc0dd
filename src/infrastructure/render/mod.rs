pub mod engine;
pub mod template_cache;

pub use engine::{RenderEngineError, TemplateRenderer};
pub use template_cache::CachedTemplateProvider;
