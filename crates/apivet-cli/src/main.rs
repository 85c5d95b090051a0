//! apivet CLI - Check a running service against its own Swagger contract

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use apivet_core::audit::check_consistency;
use apivet_core::{Config, Plan, SwaggerDocument, compare, to_http_file};
use apivet_runner::ServiceValidation;

#[derive(Parser)]
#[command(name = "apivet")]
#[command(about = "Check a running service against its own Swagger contract")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Strict mode (warnings fail the run). Use --strict false to relax.
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the service's document and check every declared response
    Check {
        /// Config file (default: .apivet.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Write failing requests as a .http reproduction file
        #[arg(long)]
        http_file: Option<PathBuf>,
    },

    /// List what a check would request, without sending anything
    Inspect {
        /// Swagger document (JSON or YAML)
        document: PathBuf,

        /// Config file providing setup rules (default: .apivet.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Compare shared models of two document files
    Compare {
        /// Document of the service under test
        local: PathBuf,

        /// Document of the master service
        master: PathBuf,

        /// Only compare definitions whose name starts with this prefix
        #[arg(long)]
        service: Option<String>,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for the report format
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let cfg = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    Ok(cfg)
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Check {
            config,
            base_url,
            http_file,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(url) = base_url {
                cfg.base_url = url;
            }

            if cli.output != OutputFormat::Silent {
                eprintln!("Config:");
                eprintln!("  base_url: {}{}", cfg.base_url, cfg.swagger_path);
                if let Some(master) = &cfg.master_url {
                    eprintln!("  master:   {master}{}", cfg.master_swagger_path);
                }
                if !cfg.headers.is_empty() {
                    eprintln!("  headers:  {} configured", cfg.headers.len());
                }
                eprintln!("  setup:    {} rules", cfg.setup.len());
                eprintln!();
            }

            let report = ServiceValidation::new(&cfg)
                .with_progress(cli.output != OutputFormat::Silent)
                .run()
                .with_context(|| format!("validating {}", cfg.base_url))?;

            match cli.output {
                OutputFormat::Terminal => println!("\n{}", report.to_terminal(cli.strict)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Silent => {}
            }

            if let Some(path) = http_file {
                if report.failed_verdicts().next().is_some() {
                    std::fs::write(&path, to_http_file(&report.verdicts, "base_url"))
                        .with_context(|| format!("writing {}", path.display()))?;
                    if cli.output != OutputFormat::Silent {
                        eprintln!("Reproductions: {}", path.display());
                    }
                }
            }

            Ok(report.exit_code(cli.strict))
        }

        Commands::Inspect { document, config } => {
            let cfg = load_config(config.as_deref())?;
            let doc = SwaggerDocument::from_file(&document)?;
            let plan = Plan::build(&doc, &cfg.setup_registry());
            match cli.output {
                OutputFormat::Terminal => println!("{}", plan.to_terminal()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                OutputFormat::Silent => {}
            }
            Ok(i32::from(plan.unbuildable().next().is_some()))
        }

        Commands::Compare {
            local,
            master,
            service,
        } => {
            let local_doc = SwaggerDocument::from_file(&local)?;
            let master_doc = SwaggerDocument::from_file(&master)?;
            let discrepancies = compare(&local_doc, &master_doc, service.as_deref());
            match cli.output {
                OutputFormat::Terminal => {
                    if discrepancies.is_empty() {
                        println!("Consistent: shared models match {}", master.display());
                    } else {
                        println!("Discrepancies ({}):", discrepancies.len());
                        for d in &discrepancies {
                            println!("  {d}");
                        }
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&discrepancies)?);
                }
                OutputFormat::Silent => {}
            }
            let check = check_consistency(&discrepancies);
            Ok(if check.passed {
                0
            } else {
                check.severity.exit_code(cli.strict)
            })
        }

        Commands::Init => {
            let config_path = ".apivet.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - base_url: service to check");
            println!("  - headers: auth tokens, API keys");
            println!("  - [[setup]]: path parameters, bodies and headers per endpoint");
            println!("  - master_url: upstream service whose models must match");
            Ok(0)
        }

        Commands::Schema => {
            let schema = apivet_core::verdict::generate_schema();
            println!("{schema}");
            Ok(0)
        }
    }
}
