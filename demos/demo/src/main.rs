use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use clap::{Parser, Subcommand};
use room_chat::view::memory::InputField;
use room_chat::{
    ChatClientView, ChatConfig, ChatElements, ChatError, MessageList, MessageNode, PageLocation,
    ReadyState, Relay, SocketOptions, TextField,
};

/// Terminal chat over the room relay.
#[derive(Parser, Debug)]
#[command(name = "demo", about = "Room chat demo")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the room relay.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,
    },
    /// Join a room; each stdin line is sent as a message.
    Join {
        /// Page the room belongs to; its last path segment is the room id.
        #[arg(long, default_value = "http://127.0.0.1:8000/chat/lobby")]
        page: String,

        #[arg(long, default_value = "")]
        username: String,

        /// Origin header for the handshake.
        #[arg(long)]
        origin: Option<String>,
    },
}

/// Message container that prints to stdout.
#[derive(Default)]
struct TerminalLog {
    lines: usize,
    scroll_top: usize,
}

impl MessageList for TerminalLog {
    fn append(&mut self, node: MessageNode) {
        println!("{}", node);
        self.lines += node.line_count();
    }

    fn scroll_height(&self) -> usize {
        self.lines
    }

    fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, top: usize) {
        self.scroll_top = top.min(self.lines);
        let _ = io::stdout().flush();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match Cli::parse().command {
        Command::Serve { addr } => serve(&addr),
        Command::Join {
            page,
            username,
            origin,
        } => join(&page, &username, origin),
    }
}

fn serve(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let relay = Relay::bind(addr).await?;
        log::info!("Relay ready on {}", relay.local_addr()?);
        relay.run().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn join(page: &str, username: &str, origin: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let location = PageLocation::parse(page)?;
    let mut socket = SocketOptions::default();
    if let Some(origin) = origin {
        socket = socket.with_origin(origin);
    }
    let config = ChatConfig::default().with_socket_options(socket);

    let elements = ChatElements::new(
        InputField::new(username),
        InputField::default(),
        TerminalLog::default(),
    );
    let mut view = ChatClientView::connect(elements, &location, &config)?;

    let lines = spawn_stdin_reader();
    let mut was_open = false;

    loop {
        match view.pump() {
            Ok(_) => {}
            Err(e) if e.is_payload_error() => eprintln!("! unreadable message: {}", e),
            Err(e) => return Err(e.into()),
        }

        match view.ready_state() {
            ReadyState::Open => was_open = true,
            ReadyState::Closed => {
                eprintln!("! connection closed");
                break;
            }
            ReadyState::Connecting | ReadyState::Closing => {}
        }

        let line = match lines.recv_timeout(Duration::from_millis(50)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if line.trim() == "/quit" {
            break;
        }
        if let Some(name) = line.strip_prefix("/name ") {
            view.elements_mut().username.set_value(name);
            continue;
        }

        view.elements_mut().message.set_value(&line);
        match view.on_key_press("Enter") {
            Ok(true) => {}
            Ok(false) => {
                if view.elements().username.value().trim().is_empty() {
                    eprintln!("! set a name first: /name <you>");
                }
            }
            Err(ChatError::NotOpen) if !was_open => eprintln!("! still connecting"),
            Err(e) => eprintln!("! {}", e),
        }
    }

    view.close();
    // Let the close frame go out before the process exits.
    let _ = view.wait_event(Duration::from_millis(500));
    Ok(())
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
