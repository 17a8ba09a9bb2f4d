//! consul-registration-hook - register pod services in Consul from lifecycle hooks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use registration_hook::config::{
    DEFAULT_HEALTH_CHECK_TIMEOUT, DEFAULT_LB_TAG_PREFIX, DEFAULT_POD_TIMEOUT,
};
use registration_hook::registry::consul::{read_token, DEFAULT_CONSUL_ADDRESS};
use registration_hook::{
    ConsulAgent, FlagService, HookConfig, KubeSource, RegisterOutcome, RegistrationHook,
    RegistrySink,
};

/// Register and deregister pod services in Consul.
#[derive(Parser)]
#[command(name = "consul-registration-hook")]
#[command(about = "Synchronous Consul registration for Kubernetes lifecycle hooks")]
#[command(version)]
struct Cli {
    /// Consul agent address.
    #[arg(long, env = "CONSUL_HTTP_ADDR", default_value = DEFAULT_CONSUL_ADDRESS, global = true)]
    consul_address: String,

    /// File holding the Consul ACL token (falls back to `CONSUL_HTTP_TOKEN`).
    #[arg(long, global = true)]
    consul_token_file: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false", global = true)]
    verbose: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Register services (postStart hook).
    Register {
        #[command(subcommand)]
        target: RegisterTarget,
    },

    /// Deregister services (preStop hook).
    Deregister {
        #[command(subcommand)]
        target: DeregisterTarget,
    },
}

#[derive(Subcommand)]
enum RegisterTarget {
    /// Read the hook's own pod from the Kubernetes API.
    K8s(K8sArgs),

    /// Register one service described by flags.
    Flags {
        /// Service name.
        #[arg(long)]
        service_name: String,

        /// Service address.
        #[arg(long)]
        address: String,

        /// Service port.
        #[arg(long)]
        port: u16,

        /// Service tags (comma-separated).
        #[arg(long, default_value = "")]
        tags: String,

        /// HTTP check path.
        #[arg(long, default_value = "")]
        check_path: String,
    },
}

#[derive(Subcommand)]
enum DeregisterTarget {
    /// Read the hook's own pod from the Kubernetes API.
    K8s(K8sArgs),

    /// Deregister the service registered with the same flags.
    Flags {
        /// Service address.
        #[arg(long)]
        address: String,

        /// Service port.
        #[arg(long)]
        port: u16,
    },
}

#[derive(Args)]
struct K8sArgs {
    /// Namespace of the hook's pod.
    #[arg(long, env = "KUBERNETES_POD_NAMESPACE")]
    pod_namespace: Option<String>,

    /// Name of the hook's pod.
    #[arg(long, env = "KUBERNETES_POD_NAME")]
    pod_name: Option<String>,

    /// Seconds to wait for the pod to get an address.
    #[arg(long, env = "HOOK_TIMEOUT", default_value_t = DEFAULT_POD_TIMEOUT.as_secs())]
    timeout: u64,

    /// Seconds to wait for the local health gate.
    #[arg(long, env = "HOOK_HEALTH_CHECK_TIMEOUT", default_value_t = DEFAULT_HEALTH_CHECK_TIMEOUT.as_secs())]
    health_check_timeout: u64,

    /// JSON port definitions; replaces container ports when set.
    #[arg(long, env = "PORT_DEFINITIONS")]
    port_definitions: Option<String>,

    /// Port advertised in the `service-port:` tag.
    #[arg(long, env = "SERVICE_PORT")]
    service_port: Option<u16>,

    /// Tag prefix excluded from secured services.
    #[arg(long, env = "HOOK_LB_TAG_PREFIX", default_value = DEFAULT_LB_TAG_PREFIX)]
    lb_tag_prefix: String,
}

impl K8sArgs {
    fn into_config(self) -> Result<HookConfig> {
        let (Some(namespace), Some(name)) = (self.pod_namespace, self.pod_name) else {
            bail!("pod namespace and name are required (KUBERNETES_POD_NAMESPACE, KUBERNETES_POD_NAME)");
        };

        HookConfig::new(namespace, name)
            .with_pod_timeout(Duration::from_secs(self.timeout))
            .with_health_check_timeout(Duration::from_secs(self.health_check_timeout))
            .with_service_port(self.service_port)
            .with_lb_tag_prefix(self.lb_tag_prefix)
            .with_raw_port_definitions(self.port_definitions.as_deref())
            .context("Invalid PORT_DEFINITIONS")
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let token = read_token(
        cli.consul_token_file.as_deref(),
        std::env::var("CONSUL_HTTP_TOKEN").ok(),
    );
    let agent = Arc::new(
        ConsulAgent::new(&cli.consul_address, token).context("Failed to create Consul client")?,
    );

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            signal.cancel();
        }
    });

    match cli.command {
        Commands::Register {
            target: RegisterTarget::K8s(args),
        } => {
            let hook = k8s_hook(args, agent).await?;
            match hook.register(&cancel).await? {
                RegisterOutcome::NothingToRegister => info!("Nothing to register"),
                RegisterOutcome::Terminating => info!("Pod is terminating, registration skipped"),
                RegisterOutcome::Registered(count) => info!(count, "Registered services"),
            }
        }

        Commands::Register {
            target:
                RegisterTarget::Flags {
                    service_name,
                    address,
                    port,
                    tags,
                    check_path,
                },
        } => {
            let record = FlagService {
                name: service_name,
                address,
                port,
                tags,
                check_path,
            }
            .record();
            agent
                .register(std::slice::from_ref(&record))
                .await
                .with_context(|| format!("Failed to register {}", record.id))?;
        }

        Commands::Deregister {
            target: DeregisterTarget::K8s(args),
        } => {
            let hook = k8s_hook(args, agent).await?;
            let count = hook.deregister(&cancel).await?;
            info!(count, "Deregistered services");
        }

        Commands::Deregister {
            target: DeregisterTarget::Flags { address, port },
        } => {
            let record = FlagService {
                address,
                port,
                ..FlagService::default()
            }
            .record();
            agent
                .deregister(std::slice::from_ref(&record))
                .await
                .with_context(|| format!("Failed to deregister {}", record.id))?;
        }
    }

    Ok(())
}

async fn k8s_hook(args: K8sArgs, agent: Arc<ConsulAgent>) -> Result<RegistrationHook> {
    let config = args.into_config()?;
    let source = KubeSource::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    Ok(RegistrationHook::new(Arc::new(source), agent, config))
}
