//! # 依赖注入具体实现
//!
//! 提供层次化注入器：同步解析、异步（Promise）解析、延迟解析，以及带覆盖的子注入器。
//!
//! ```no_run
//! use di_abstractions::{inject, AnnotationRegistry, Module};
//! use di_impl::Injector;
//! use std::sync::Arc;
//!
//! struct Engine;
//! struct Car {
//!     engine: Arc<Engine>,
//! }
//!
//! let registry = Arc::new(AnnotationRegistry::new());
//! registry.define_class::<Engine, _>([], |_| Ok(Engine));
//! registry.define_class::<Car, _>([inject([infrastructure_common::Token::of::<Engine>()])], |args| {
//!     Ok(Car { engine: args.get::<Engine>(0)? })
//! });
//!
//! let injector = Injector::new(registry, Module::new()).unwrap();
//! let car = injector.resolve::<Car>().unwrap();
//! assert!(Arc::ptr_eq(&car.engine, &injector.resolve::<Engine>().unwrap()));
//! ```

mod builder;
mod injector;
mod promise;
mod scope;

pub use builder::InjectorBuilder;
pub use injector::Injector;
pub use scope::ScopeManager;
