//! Declarative state management for message broker objects over SEMP v2.

pub mod config;
pub mod object;
pub mod semp;
pub mod task;

/// Version injected at compile time via SEMPCTL_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("SEMPCTL_VERSION") {
    Some(v) => v,
    None => "dev",
};
