use std::env;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use credentials::FileTokenStore;
use layers::HeadlessMap;
use overlay::{LoaderConfig, OverlayController, OverlayState};
use session::{
    AnomalyFilter, ApiClient, ApiConfig, RegisterForm, SatelliteImageForm, Session,
    SessionContext, SessionEvent, Severity, Upload,
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_TOKEN_FILE: &str = ".pipewatch/tokens.json";

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Pipeline monitoring client")]
struct Args {
    /// Backend base URL (default: PIPEWATCH_API_URL or http://localhost:8000/api)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Where the token pair is kept (default: PIPEWATCH_TOKEN_FILE or .pipewatch/tokens.json)
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the token pair
    Login {
        #[arg(long)]
        username: String,
        /// Falls back to PIPEWATCH_PASSWORD
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account, then sign in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Activate an account with the uid and token from the activation email
    Activate { uid: String, token: String },

    /// Forget the stored tokens
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List pipelines
    Pipelines,

    /// List satellite images
    Images {
        #[arg(long)]
        pipeline: Option<String>,
    },

    /// Upload a GeoTIFF as a new satellite image
    Upload {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        pipeline: Option<String>,
        #[arg(long)]
        acquired: Option<String>,
    },

    /// Resolve bounds and load the overlay for one image
    Overlay { image_id: String },

    /// List detected anomalies
    Anomalies {
        #[arg(long)]
        unresolved: bool,
        #[arg(long, value_enum)]
        severity: Option<SeverityArg>,
    },

    /// List notifications
    Notifications {
        #[arg(long)]
        unread: bool,
    },

    /// Mark one notification (or all of them) as read
    MarkRead {
        #[arg(required_unless_present = "all")]
        id: Option<String>,
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SeverityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Low => Severity::Low,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::High => Severity::High,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}

#[tokio::main]
async fn main() -> CliResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match args.api_url {
        Some(url) => {
            let defaults = ApiConfig::from_env();
            ApiConfig::new(url).with_timeouts(defaults.request_timeout, defaults.raster_timeout)
        }
        None => ApiConfig::from_env(),
    };
    let token_file = args.token_file.unwrap_or_else(|| {
        env::var("PIPEWATCH_TOKEN_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_FILE))
    });
    info!(api = %config.base_url, tokens = %token_file.display(), "starting");

    let ctx = SessionContext::new(FileTokenStore::new(token_file));
    let mut events = ctx.subscribe();
    let session = Session::new(ApiClient::new(config, ctx));

    let result = run(&session, args.command).await;
    report_expiry(&mut events);
    result
}

async fn run(session: &Session, command: Command) -> CliResult {
    let client = session.client();
    match command {
        Command::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => env::var("PIPEWATCH_PASSWORD")
                    .map_err(|_| "no password: pass --password or set PIPEWATCH_PASSWORD")?,
            };
            let outcome = session.login(&username, &password).await?;
            print_login(outcome);
        }
        Command::Register {
            username,
            email,
            password,
            confirm,
        } => {
            let form = RegisterForm {
                username,
                email,
                re_password: confirm.unwrap_or_else(|| password.clone()),
                password,
            };
            let outcome = session.register(&form).await?;
            print_login(outcome);
        }
        Command::Activate { uid, token } => {
            client.users().activate(&uid, &token).await?;
            println!("account activated");
        }
        Command::Logout => {
            session.logout();
            println!("logged out");
        }
        Command::Whoami => {
            let user = session.current_user().await?;
            println!("{}\t{}\t{}", user.id, user.username, user.display_name());
            if let Some(exp) = session.access_token_expires_at() {
                println!("access token expires at {exp}");
            }
        }
        Command::Pipelines => {
            for p in client.pipelines().list().await? {
                let length = p.length_km.map(|l| format!("{l:.1}km")).unwrap_or_default();
                println!(
                    "{}\t{}\t{:?}\t{}\t{} images",
                    p.id, p.name, p.status, length, p.satellite_images_count
                );
            }
        }
        Command::Images { pipeline } => {
            for img in client.satellite_images().list(pipeline.as_deref()).await? {
                let bounds = match img.embedded_bounds() {
                    Some(b) if b.is_valid_wgs84() => format!(
                        "{:.4},{:.4},{:.4},{:.4}",
                        b.min_lon, b.min_lat, b.max_lon, b.max_lat
                    ),
                    Some(_) => "projected".to_string(),
                    None => "-".to_string(),
                };
                println!(
                    "{}\t{}\t{}\t{}",
                    img.id,
                    img.name,
                    img.acquisition_date.as_deref().unwrap_or("-"),
                    bounds
                );
            }
        }
        Command::Upload {
            path,
            name,
            pipeline,
            acquired,
        } => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or("upload path has no file name")?;
            let bytes = std::fs::read(&path)?;
            let form = SatelliteImageForm {
                name: name.unwrap_or_else(|| file_name.clone()),
                pipeline,
                acquisition_date: acquired,
                original_tiff: Some(Upload::new(file_name, bytes).with_mime("image/tiff")),
                ..SatelliteImageForm::default()
            };
            let img = client.satellite_images().create(&form).await?;
            println!("{}	{}	uploaded", img.id, img.name);
        }
        Command::Overlay { image_id } => {
            let map = HeadlessMap::new();
            let controller =
                OverlayController::new(client.clone(), map.clone(), LoaderConfig::default());
            match controller.select_id(&image_id).await {
                OverlayState::Displayed { bounds, layer } => {
                    let bytes = map.overlays().first().map(|o| o.image.len()).unwrap_or(0);
                    println!(
                        "displayed\tlayer {}\t{:.5},{:.5},{:.5},{:.5}\t{} bytes",
                        layer.0, bounds.min_lon, bounds.min_lat, bounds.max_lon, bounds.max_lat, bytes
                    );
                }
                OverlayState::Unavailable => println!("unavailable\tno geographic bounds"),
                OverlayState::Failed(failure) => {
                    return Err(format!("{} ({})", failure.message(), failure.detail).into());
                }
                other => println!("{}", other.name()),
            }
            controller.unmount();
        }
        Command::Anomalies {
            unresolved,
            severity,
        } => {
            let filter = AnomalyFilter {
                is_resolved: unresolved.then_some(false),
                severity: severity.map(Severity::from),
                ..AnomalyFilter::default()
            };
            for a in client.anomalies().list(&filter).await? {
                println!(
                    "{}\t{}\t{}\t{:.5},{:.5}\t{:.2}\t{}",
                    a.id,
                    a.severity.as_str(),
                    a.anomaly_type,
                    a.location_lat,
                    a.location_lon,
                    a.confidence_score,
                    if a.is_resolved { "resolved" } else { "open" }
                );
            }
        }
        Command::Notifications { unread } => {
            let is_read = unread.then_some(false);
            for n in client.notifications().list(is_read).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    n.id,
                    if n.is_read { "read" } else { "unread" },
                    n.created_at,
                    n.title
                );
            }
            println!("{} unread", client.notifications().unread_count().await?);
        }
        Command::MarkRead { id, all } => {
            if all {
                client.notifications().mark_all_read().await?;
                println!("all notifications marked read");
            } else if let Some(id) = id {
                client.notifications().mark_read(&id).await?;
                println!("{id} marked read");
            }
        }
    }
    Ok(())
}

fn print_login(outcome: session::LoginOutcome) {
    match (outcome.user, outcome.profile_error) {
        (Some(user), _) => println!("logged in as {}", user.display_name()),
        (None, Some(err)) => println!("logged in; profile unavailable: {err}"),
        (None, None) => println!("logged in"),
    }
}

/// Stands in for the login redirect: tell the user to sign in again.
fn report_expiry(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Expired { reason } = event {
            warn!("session expired: {reason}");
            eprintln!("session expired ({reason}); run `pipewatch login` to sign in again");
        }
    }
}
