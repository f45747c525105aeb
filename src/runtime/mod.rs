//! Runtime assembly: the builder, the facade, and the shared shell.

mod builder;
mod runtime;
mod shell;

pub use builder::MeshRuntimeBuilder;
pub use runtime::MeshRuntime;

pub(crate) use shell::Shell;
