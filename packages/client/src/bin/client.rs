//! Line-based SyncRoom client.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin syncroom-client -- --room abc --username alice --password pw1
//! ```

use std::{path::PathBuf, thread};

use clap::Parser;
use rustyline::{DefaultEditor, error::ReadlineError};
use syncroom_client::{
    ClientError, Command, ContentEditor, LineBufferEditor, RoomClient, RoomEvent,
};
use syncroom_shared::logger::setup_logger;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "syncroom-client")]
#[command(version)]
#[command(about = "Join a SyncRoom room and edit its shared buffer", long_about = None)]
struct ClientArgs {
    /// WebSocket endpoint of the relay
    #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    #[arg(long)]
    room: String,

    #[arg(long)]
    username: String,

    #[arg(long, env = "SYNCROOM_PASSWORD")]
    password: String,

    /// Initial buffer, used only when this join creates the room
    #[arg(long)]
    initial_file: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

/// Input from the readline thread
enum Input {
    Line(String),
    Eof,
}

#[tokio::main]
async fn main() {
    let args = ClientArgs::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    if let Err(e) = run(args).await {
        tracing::error!("Client error: {}", e);
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let initial_code = match &args.initial_file {
        Some(path) => Some(tokio::fs::read_to_string(path).await?),
        None => None,
    };

    let mut client = RoomClient::connect(&args.url).await?;
    client
        .join(&args.room, &args.username, &args.password, initial_code)
        .await?;

    // Local edits are forwarded to the room as whole-buffer changes
    let (local_tx, mut local_rx) = mpsc::unbounded_channel::<String>();
    let mut editor = LineBufferEditor::new();
    editor.on_local_content_changed(Box::new(move |text| {
        let _ = local_tx.send(text);
    }));

    let mut input = spawn_readline()?;
    let mut users: Vec<String> = Vec::new();
    let mut joined = false;

    loop {
        tokio::select! {
            event = client.next_event() => {
                let Some(event) = event else {
                    println!("* connection closed");
                    break;
                };
                match event {
                    RoomEvent::Joined => {
                        joined = true;
                        println!("* joined room '{}' as '{}'", args.room, args.username);
                    }
                    RoomEvent::JoinRejected(message) => {
                        println!("* join rejected: {message}");
                        break;
                    }
                    RoomEvent::InitialContent(code) | RoomEvent::RemoteContent { code, .. } => {
                        editor.apply_remote_content(&code);
                        println!("--- buffer ---\n{}\n--------------", editor.content());
                    }
                    RoomEvent::UserJoined { username, users: now } => {
                        println!("* {username} joined ({})", now.join(", "));
                        users = now;
                    }
                    RoomEvent::UserLeft { username, users: now } => {
                        println!("* {username} left ({})", now.join(", "));
                        users = now;
                    }
                }
            }
            Some(code) = local_rx.recv() => {
                if joined {
                    client.send_code(code).await?;
                }
            }
            line = input.recv() => {
                let Some(Input::Line(line)) = line else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Command::Append(text)) => editor.append_line(&text),
                    Ok(Command::Set(text)) => editor.set_content(text),
                    Ok(Command::Show) => println!("{}", editor.content()),
                    Ok(Command::Users) => println!("{}", users.join(", ")),
                    Ok(Command::Leave) => {
                        match client.leave().await {
                            Ok(()) | Err(ClientError::NotJoined) => {}
                            Err(e) => return Err(e.into()),
                        }
                        break;
                    }
                    Ok(Command::Quit) => break,
                    Err(e) => println!("* {e}"),
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}

/// Read lines on a dedicated thread, rustyline blocks
fn spawn_readline() -> Result<mpsc::UnboundedReceiver<Input>, ReadlineError> {
    let mut rl = DefaultEditor::new()?;
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        loop {
            match rl.readline("> ") {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    if tx.send(Input::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                    let _ = tx.send(Input::Eof);
                    break;
                }
                Err(e) => {
                    tracing::error!("Readline error: {}", e);
                    let _ = tx.send(Input::Eof);
                    break;
                }
            }
        }
    });
    Ok(rx)
}
