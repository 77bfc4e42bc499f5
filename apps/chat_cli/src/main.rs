mod commands;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{config::normalize_server_url, load_settings, ChatClient, ClientEvent};
use shared::domain::{ChatId, Participant, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing_subscriber::EnvFilter;

use crate::commands::{parse_input_line, InputCommand, HELP};

#[derive(Parser, Debug)]
#[command(about = "Terminal front end for a realtime chat server")]
struct Args {
    /// Overrides `server_url` from client.toml and the environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    user_id: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    token: String,
    /// Conversation to open right after connecting.
    #[arg(long)]
    chat: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = &args.server_url {
        settings.server_url = normalize_server_url(server_url);
    }
    let session = Session::new(Participant::new(args.user_id, args.name), args.token);
    let me = session.user_id().clone();

    let client = ChatClient::connect(session, &settings).await?;
    tracing::info!(server_url = %settings.server_url, "connected");

    client.on_typing_change(|chat_id, typing| {
        if typing {
            println!("[{chat_id}] someone is typing...");
        } else {
            println!("[{chat_id}] stopped typing");
        }
    });

    let mut events = BroadcastStream::new(client.subscribe_events());
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(ClientEvent::TranscriptLoaded { chat_id, count }) => {
                    println!("-- {chat_id}: {count} messages loaded")
                }
                Ok(ClientEvent::MessageAppended { message }) => {
                    println!("{}: {}", message.sender.name, message.body)
                }
                Ok(ClientEvent::NotificationsChanged { pending }) => {
                    println!("-- {pending} unread notification(s); /notifications to list")
                }
                Ok(ClientEvent::Error(notice)) => println!("!! {notice}"),
                Ok(_) => {}
                Err(err) => tracing::warn!("event stream lagged: {err}"),
            }
        }
    });

    if let Some(chat) = &args.chat {
        let chat_id = ChatId::new(chat.as_str());
        report(
            client
                .select_conversation(Some(InputCommand::conversation(&chat_id, None)))
                .await,
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_input_line(&line) {
            Ok(command) => command,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };
        match command {
            InputCommand::Open { chat_id, name } => {
                let chat = InputCommand::conversation(&chat_id, name.as_deref());
                report(client.select_conversation(Some(chat)).await);
            }
            InputCommand::Close => report(client.select_conversation(None).await),
            InputCommand::Notifications => {
                let pending = client.pending_notifications().await;
                if pending.is_empty() {
                    println!("-- no notifications");
                }
                for entry in pending {
                    println!("{}  {}: {}", entry.message_id(), entry.label(&me), entry.message.body);
                }
            }
            InputCommand::Dismiss { message_id } => {
                if client.dismiss_notification(&message_id).await.is_none() {
                    println!("-- no notification {message_id}");
                }
            }
            InputCommand::Follow { message_id } => match client.open_notification(&message_id).await {
                Ok(true) => {}
                Ok(false) => println!("-- no notification {message_id}"),
                Err(err) => println!("!! {err}"),
            },
            InputCommand::Transcript => print_transcript(&client).await,
            InputCommand::Help => println!("{HELP}"),
            InputCommand::Quit => break,
            InputCommand::Say(text) => {
                client.compose_input(&text).await;
                if let Err(err) = client.send_message(&text).await {
                    println!("!! {err}");
                }
            }
        }
    }

    Ok(())
}

async fn print_transcript(client: &Arc<ChatClient>) {
    let Some(chat) = client.active_conversation().await else {
        println!("-- no conversation selected");
        return;
    };
    println!("-- {}", chat.display_name(client.session().user_id()));
    for message in client.current_transcript().await {
        println!(
            "[{}] {}: {}",
            message.created_at.format("%H:%M"),
            message.sender.name,
            message.body
        );
    }
}

fn report(result: Result<(), client_core::ClientError>) {
    if let Err(err) = result {
        println!("!! {err}");
        if err.is_retryable() {
            println!("-- reopen the conversation to retry");
        }
    }
}
