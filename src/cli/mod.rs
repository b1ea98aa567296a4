//! # CLI Module
//!
//! Command-line front end for the route compiler.
//!
//! ## Commands
//!
//! ### `inspect`
//!
//! Compile a description and print the route table:
//!
//! ```bash
//! brrtroutes inspect --spec api.yaml
//! brrtroutes inspect --spec api.yaml --handlers ./handlers --json
//! ```
//!
//! ### `check`
//!
//! Compile and report fatal security errors; exits non-zero on failure:
//!
//! ```bash
//! brrtroutes check --spec api.yaml --config routes.yaml
//! ```
//!
//! ### `invoke`
//!
//! Compile, then push one request through a route (authorize, validate,
//! handle) and print the response:
//!
//! ```bash
//! brrtroutes invoke --spec api.yaml --method GET --path /v1/pets/{id} \
//!     --param id=7 --query verbose=true --header "X-API-Key=test123"
//! ```
//!
//! Routes without an `x-handler` or handler-tree entry are served by the echo
//! handler unless `--no-default` is given. Module references are read as
//! declarative manifests relative to `--basedir`, which defaults to the
//! description's directory.

mod commands;


pub use commands::{run, run_cli, Cli, Commands, CompileArgs};
