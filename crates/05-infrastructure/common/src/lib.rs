//! # Infrastructure Common
//!
//! 依赖注入容器共用的基础类型。
//!
//! ## 核心类型
//!
//! - [`Token`] - 依赖令牌（类型或名称）
//! - [`ScopeTag`] / [`Lifetime`] - 作用域标记与实例生命周期
//! - [`DependencyError`] - 依赖解析错误
//! - [`InjectorConfig`] - 注入器配置

pub mod configuration;
pub mod errors;
pub mod lifecycle;
pub mod token;

pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
pub use token::*;
