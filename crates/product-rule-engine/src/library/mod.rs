//! 规则模板库
//!
//! 提供规则模板的参数化支持，包括模板定义、参数验证和规则编译
//!
//! # 主要功能
//!
//! - `ParameterDef`: 模板参数定义，支持多种类型和验证规则
//! - `RuleTemplate`: 规则模板，包含可参数化的规则定义
//! - `TemplateCompiler`: 将模板与参数编译为 `Rule`
//! - `builtin_templates`: 内置的定价、内容、过滤模板

pub mod builtin;
pub mod compiler;
pub mod models;

pub use builtin::{builtin_templates, find_builtin};
pub use compiler::{TemplateCompileError, TemplateCompiler};
pub use models::*;
