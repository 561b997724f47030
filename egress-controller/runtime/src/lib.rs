#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use haegress_controller_k8s_api as k8s;
pub use haegress_controller_k8s_sync as sync;

mod args;
mod lease;

pub use self::args::Args;
