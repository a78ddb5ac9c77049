use std::sync::Arc;

use clap::Parser;
use colored::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roomchat::channel::RealtimeChannel;
use roomchat::cli::{apply_overrides, default_log_filter, Args};
use roomchat::config::Config;
use roomchat::landing::LandingView;
use roomchat::room_view::RoomView;
use roomchat::rooms::HttpRoomApi;
use roomchat::storage::{FileStorage, MemoryStorage, SharedStorage, USERNAME_KEY};
use roomchat::terminal::{spawn_stdin_lines, TerminalView};
use roomchat::Navigation;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(args.verbose).into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = apply_overrides(&args, Config::load(&args.config)?);

    if args.write_config {
        config.write_to_file(&args.config)?;
        eprintln!("{} {}", "wrote".bright_green(), args.config.display());
        return Ok(());
    }

    let api = HttpRoomApi::new(&config.server.url, config.request_timeout())?;
    let storage: SharedStorage = match &config.client.session_file {
        Some(path) => {
            let file = FileStorage::open(path)?;
            if args.new_session {
                file.clear()?;
            }
            Arc::new(file)
        }
        None => MemoryStorage::shared(),
    };

    let mut preset_name = config
        .client
        .username
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    let mut route = match (&preset_name, &args.room) {
        (Some(name), Some(room)) => {
            storage.set_item(USERNAME_KEY, name);
            Navigation::Room(room.clone())
        }
        _ => Navigation::Landing,
    };

    let mut input = spawn_stdin_lines();

    loop {
        info!(?route, "route");
        route = match route {
            Navigation::Landing => {
                let mut landing = LandingView::new(api.clone(), storage.clone(), TerminalView::new())
                    .with_username(preset_name.take());
                landing.run(&mut input).await
            }
            Navigation::Room(room_id) => {
                let channel = RealtimeChannel::new(api.base_url().clone());
                match RoomView::open(
                    &room_id,
                    api.clone(),
                    storage.clone(),
                    channel,
                    TerminalView::new(),
                    config.typing_timeout(),
                ) {
                    Ok(room) => {
                        println!(
                            "{} {} {}",
                            "sala".bold(),
                            room.room_id().bright_green().bold(),
                            "(/help para ajuda)".dimmed()
                        );
                        room.run(&mut input).await
                    }
                    Err(nav) => nav,
                }
            }
            Navigation::Exit => break,
        };
    }

    Ok(())
}
