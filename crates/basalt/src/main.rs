use basalt_appliance::{ApplianceClient, Transport, TransportConfig};
use basalt_core::{AgentConfig, Framework, VolumeOpts};
use basalt_driver::socket_path;
use basalt_host::{InitiatorManager, LinuxHost, Orchestrator, OrchestratorConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Name the docker engine addresses the driver by
const DRIVER_NAME: &str = "basalt";
/// Default config file in the invoking user's home directory
const DEFAULT_CONFIG_FILE: &str = ".basalt-config-file";
/// File written by --genconfig
const GEN_CONFIG_FILE: &str = "basalt-config-template.txt";

#[derive(Parser)]
#[command(name = "basalt", about = "Basalt docker volume driver", version)]
struct Cli {
    /// Config file location (default: ~/.basalt-config-file)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generate a config template. Options: 'bare', 'dcos-docker' and
    /// 'dcos-mesos'. Writes basalt-config-template.txt
    #[arg(long, value_name = "FRAMEWORK")]
    genconfig: Option<String>,

    /// Print supported --opt values
    #[arg(long, default_value_t = false)]
    print_opts: bool,
}

fn print_opts() {
    let opts = VolumeOpts::describe();
    let key_width = opts.iter().map(|(k, _, _)| k.len()).max().unwrap_or(0);
    let desc_width = opts.iter().map(|(_, d, _)| d.len()).max().unwrap_or(0);
    for (key, desc, default) in opts {
        println!(
            "{:key_width$}  --  {:desc_width$}  Default: {}",
            key, desc, default
        );
    }
}

fn gen_config(framework: &str) -> miette::Result<()> {
    let framework = match framework {
        "bare" => Framework::Bare,
        "dcos-docker" => Framework::DcosDocker,
        "dcos-mesos" => Framework::DcosMesos,
        other => {
            return Err(miette::miette!(
                help = "Supported templates: 'bare', 'dcos-docker', 'dcos-mesos'",
                "Unknown config template '{}'",
                other
            ))
        }
    };
    let conf = AgentConfig::template(framework);
    let json = serde_json::to_string_pretty(&conf)
        .map_err(|e| miette::miette!("Could not serialize template: {}", e))?;
    std::fs::write(GEN_CONFIG_FILE, json)
        .map_err(|e| miette::miette!("Could not write {}: {}", GEN_CONFIG_FILE, e))?;
    println!("Wrote {}", GEN_CONFIG_FILE);
    Ok(())
}

fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
    PathBuf::from(home).join(DEFAULT_CONFIG_FILE)
}

/// Resolve the gid that should own the plugin socket. Exits 2 when the
/// configured OS user cannot be resolved, 3 when its group cannot.
fn resolve_socket_gid(os_user: &str) -> nix::unistd::Gid {
    let user = match nix::unistd::User::from_name(os_user) {
        Ok(Some(user)) => user,
        _ => {
            eprintln!("Could not look up user {}", os_user);
            std::process::exit(2);
        }
    };
    match nix::unistd::Group::from_gid(user.gid) {
        Ok(Some(group)) => group.gid,
        _ => {
            eprintln!("Could not resolve group id {} for user {}", user.gid, os_user);
            std::process::exit(3);
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

/// Wait for either SIGINT (ctrl-c) or SIGTERM, returning which one fired.
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    if cli.print_opts {
        print_opts();
        return Ok(());
    }
    if let Some(framework) = cli.genconfig.as_deref() {
        return gen_config(framework);
    }

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let conf = match AgentConfig::load(&config_path) {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(1);
        }
    };

    init_tracing(conf.debug);
    info!(
        "Starting basalt driver: cluster: {}, username: {}, password: {}",
        conf.cluster, conf.username, "*******"
    );

    let gid = resolve_socket_gid(&conf.os_user);

    let transport = Transport::new(TransportConfig::new(
        &conf.cluster,
        &conf.username,
        &conf.password,
        conf.ssl,
        &conf.tenant,
    ))?;
    let appliance = Arc::new(ApplianceClient::new(transport));
    let host = Arc::new(LinuxHost::new());
    let initiators = InitiatorManager::new(appliance.clone());

    let orchestrator = Arc::new(Orchestrator::new(
        appliance,
        host,
        initiators,
        OrchestratorConfig {
            framework: conf.framework(),
            volume_defaults: conf.volume.clone(),
            ..Default::default()
        },
    ));

    let sock = socket_path(DRIVER_NAME);
    if let Some(parent) = sock.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| miette::miette!("Could not create {}: {}", parent.display(), e))?;
    }
    // A stale socket from a previous run would make bind fail
    let _ = std::fs::remove_file(&sock);

    let listener = UnixListener::bind(&sock)
        .map_err(|e| miette::miette!("Could not bind {}: {}", sock.display(), e))?;

    // The docker engine talks to the socket as the configured user's group
    nix::unistd::chown(sock.as_path(), None, Some(gid))
        .map_err(|e| miette::miette!("Could not chown {}: {}", sock.display(), e))?;
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(&sock, std::fs::Permissions::from_mode(0o660))
        .map_err(|e| miette::miette!("Could not chmod {}: {}", sock.display(), e))?;

    let token = CancellationToken::new();
    let serve_token = token.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = basalt_driver::serve(listener, orchestrator, serve_token).await {
            error!("Plugin server error: {}", e);
        }
    });

    info!("Listening on {}", sock.display());

    let sig = shutdown_signal().await;
    info!("Received {}, shutting down gracefully...", sig);
    token.cancel();

    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), server_handle).await;
    let _ = std::fs::remove_file(&sock);
    info!("Shutdown complete");

    Ok(())
}
