use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use staffing::database::init_database;
use staffing::middleware::RequestIdMiddleware;
use staffing::{AuthService, BookingService, Config, FinanceService, routes};

#[derive(Parser, Debug)]
#[command(
    name = "staffing",
    about = "Booking, staffing and finance backend for a temp-staffing agency",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API (default command)
    Serve(ServeArgs),
    /// Mark every approved booking whose end time has passed as executed
    SyncExecuted,
    /// Mint a bearer token for an existing user
    IssueToken(IssueTokenArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct IssueTokenArgs {
    #[arg(long)]
    user_id: i64,
    /// Role to embed; repeat for several
    #[arg(long = "role")]
    roles: Vec<String>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => serve(config, args).await,
        Command::SyncExecuted => {
            let pool = init_database(&config).await?;
            let executed = BookingService::new(pool).sync_executed().await?;
            println!("{} bookings marked as executed", executed);
            Ok(())
        }
        Command::IssueToken(args) => {
            let token = AuthService::new(config).issue_token(args.user_id, args.roles)?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    log::info!(
        "Starting staffing API (environment: {})",
        config.environment
    );

    let pool = init_database(&config).await?;
    log::info!("Database initialized");

    let auth_service = web::Data::new(AuthService::new(config.clone()));
    let booking_service = web::Data::new(BookingService::new(pool.clone()));
    let finance_service = web::Data::new(FinanceService::new(pool));
    let config_data = web::Data::new(config.clone());

    let server_address = config.server_address();
    log::info!("Server starting on http://{}", server_address);

    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(auth_service.clone())
            .app_data(booking_service.clone())
            .app_data(finance_service.clone())
            .wrap(
                Cors::default()
                    .allowed_origin(&config.client_base_url)
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        "Authorization",
                        "Content-Type",
                        "Accept",
                        "X-Correlation-ID",
                    ])
                    .expose_headers(vec!["Content-Disposition", "X-Correlation-ID"])
                    .max_age(3600),
            )
            .wrap(RequestIdMiddleware)
            .wrap(Logger::new(
                r#"%a "%r" %s %b %T correlation_id=%{x-correlation-id}o"#,
            ))
            .configure(routes::configure)
    })
    .bind(&server_address)?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
