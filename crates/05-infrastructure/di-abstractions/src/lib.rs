//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义注解词汇、提供者解析和注入器接口。
//!
//! ## 核心接口
//!
//! - [`AnnotationRegistry`] - 注解旁路表
//! - [`ProviderResolver`] - 令牌到提供者的映射
//! - [`DependencyResolver`] - 注入器接口
//! - [`Factory`] / [`Arguments`] / [`Lazy`] - 工厂与调用参数

pub mod annotations;
pub mod container;
pub mod factory;
pub mod registry;
pub mod resolver;

pub use annotations::*;
pub use container::*;
pub use factory::*;
pub use registry::*;
pub use resolver::*;
