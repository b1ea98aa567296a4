use crate::compile::{BasePathMode, RouteCompiler, RouteDescriptor};
use crate::config::CompilerConfig;
use crate::echo::echo;
use crate::handler::{HandlerRequest, HandlerResponse, HeaderVec, ParamVec};
use crate::logging::{init_logging, LogConfig};
use crate::resolve::{HandlerTree, ManifestLoader};
use crate::security::SecurityRequest;
use crate::spec::{load_api, ApiDescription};
use crate::validator::{print_issues, ValidationIssue};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use http::Method;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command-line interface for brrtroutes
#[derive(Parser)]
#[command(name = "brrtroutes")]
#[command(about = "Compile API descriptions into route tables", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every command.
#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// Path to the API description (YAML or JSON)
    #[arg(short, long)]
    pub spec: PathBuf,

    /// Compiler configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base directory for module references (default: the description's directory)
    #[arg(long)]
    pub basedir: Option<PathBuf>,

    /// Directory of handler manifests used as the handler tree
    #[arg(long)]
    pub handlers: Option<PathBuf>,

    /// `prepend-when-declared` or `never`
    #[arg(long)]
    pub base_path_mode: Option<BasePathMode>,

    /// Do not fall back to the echo handler
    #[arg(long, default_value_t = false)]
    pub no_default: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile and print the route table
    Inspect {
        #[command(flatten)]
        args: CompileArgs,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Compile and report errors; exits non-zero on failure
    Check {
        #[command(flatten)]
        args: CompileArgs,
    },
    /// Send one request through a compiled route
    Invoke {
        #[command(flatten)]
        args: CompileArgs,

        /// HTTP verb
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Route path as compiled, e.g. `/v1/pets/{id}`
        #[arg(short, long)]
        path: String,

        /// Path parameter `name=value` (repeatable)
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Query parameter `name=value` (repeatable)
        #[arg(long, value_parser = parse_key_val)]
        query: Vec<(String, String)>,

        /// Header `name=value` (repeatable)
        #[arg(long, value_parser = parse_key_val)]
        header: Vec<(String, String)>,

        /// Cookie `name=value` (repeatable)
        #[arg(long, value_parser = parse_key_val)]
        cookie: Vec<(String, String)>,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

pub(crate) fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got `{s}`"))
}

/// Resolve the compiler configuration for a command: file (or defaults),
/// then environment, then flags.
pub(crate) fn build_config(args: &CompileArgs) -> Result<CompilerConfig> {
    let config = match &args.config {
        Some(path) => CompilerConfig::load(path)?,
        None => {
            let dir = args
                .spec
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            CompilerConfig::new(dir)
        }
    };
    let mut config = config.apply_env();
    if let Some(basedir) = &args.basedir {
        config.basedir.clone_from(basedir);
    }
    if let Some(mode) = args.base_path_mode {
        config.base_path_mode = mode;
    }
    Ok(config)
}

fn prepare(args: &CompileArgs) -> Result<(ApiDescription, RouteCompiler)> {
    let api = load_api(&args.spec)?;
    let mut compiler = RouteCompiler::new(build_config(args)?);
    if let Some(dir) = &args.handlers {
        compiler = compiler.with_handler_tree(HandlerTree::read_dir(dir, &ManifestLoader)?);
    }
    if !args.no_default {
        compiler = compiler.with_default_handler(echo());
    }
    Ok((api, compiler))
}

fn compile_routes(args: &CompileArgs) -> Result<Vec<RouteDescriptor>> {
    let (api, compiler) = prepare(args)?;
    compiler
        .compile(&api)
        .with_context(|| format!("Failed to compile {}", args.spec.display()))
}

fn print_table(routes: &[RouteDescriptor]) {
    for route in routes {
        let security = route
            .security
            .as_ref()
            .map(|map| {
                map.iter()
                    .map(|(scheme, entry)| format!("{scheme}{:?}", entry.scopes))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        println!(
            "{:<7} {:<40} {:<24} {}",
            route.method.as_str(),
            route.path,
            route.name.as_deref().unwrap_or("-"),
            security
        );
    }
}

fn inspect(args: &CompileArgs, json: bool) -> Result<()> {
    let routes = compile_routes(args)?;
    if json {
        let summaries: Vec<_> = routes.iter().map(RouteDescriptor::summary).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        print_table(&routes);
    }
    Ok(())
}

fn check(args: &CompileArgs) -> Result<()> {
    let (api, compiler) = prepare(args)?;
    match compiler.compile(&api) {
        Ok(routes) => {
            let declared = api.operation_count();
            println!(
                "✅ {}: {} route(s) compiled from {} operation(s)",
                args.spec.display(),
                routes.len(),
                declared
            );
            if routes.len() < declared {
                println!("   {} operation(s) had no handler", declared - routes.len());
            }
            Ok(())
        }
        Err(e) => {
            print_issues(&[ValidationIssue::new(e.location(), e.kind(), e.to_string())]);
            bail!("{} failed the check", args.spec.display())
        }
    }
}

fn pairs(items: &[(String, String)]) -> ParamVec {
    items
        .iter()
        .map(|(k, v)| (Arc::from(k.as_str()), v.clone()))
        .collect()
}

fn headers(items: &[(String, String)]) -> HeaderVec {
    items
        .iter()
        .map(|(k, v)| (Arc::from(k.as_str()), v.clone()))
        .collect()
}

/// Authorize, validate and handle one request against a route.
pub(crate) fn dispatch(route: &RouteDescriptor, req: HandlerRequest) -> HandlerResponse {
    if !route.authorize(&SecurityRequest::from(&req)) {
        return HandlerResponse::error(401, "Unauthorized");
    }
    if let Err(issues) = route.validate(&req) {
        return HandlerResponse::json(
            400,
            serde_json::json!({ "error": "Invalid request", "issues": issues }),
        );
    }
    route.handle(req)
}

#[allow(clippy::too_many_arguments)]
fn invoke(
    args: &CompileArgs,
    method: &str,
    path: &str,
    params: &[(String, String)],
    query: &[(String, String)],
    header: &[(String, String)],
    cookie: &[(String, String)],
    body: Option<&str>,
) -> Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid method {method}"))?;
    let body = body
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("Request body is not valid JSON")?;

    let routes = compile_routes(args)?;
    let route = routes
        .iter()
        .find(|r| r.method == method && r.path == path)
        .ok_or_else(|| anyhow!("No route for {method} {path}"))?;

    let req = HandlerRequest {
        method,
        path: path.to_string(),
        route_name: None,
        path_params: pairs(params),
        query_params: pairs(query),
        headers: headers(header),
        cookies: headers(cookie),
        form: ParamVec::new(),
        body,
    };
    let resp = dispatch(route, req);
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}

/// Run a parsed command line.
///
/// # Errors
///
/// Returns an error if loading, compiling or invoking fails.
pub fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Inspect { args, json } => inspect(args, *json),
        Commands::Check { args } => check(args),
        Commands::Invoke {
            args,
            method,
            path,
            params,
            query,
            header,
            cookie,
            body,
        } => invoke(
            args,
            method,
            path,
            params,
            query,
            header,
            cookie,
            body.as_deref(),
        ),
    }
}

/// Parse the process arguments, set up logging and run.
///
/// # Errors
///
/// See [`run`].
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let mut log = LogConfig::from_env();
    if cli.verbose {
        log = log.with_level("debug");
    }
    init_logging(&log)?;
    run(cli)
}
