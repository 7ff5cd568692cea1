use adcs::host::{RawTerminal, ReaderThread};
use adcs::interface::{Transport, TransportError};
use adcs::{AdcsConfig, AdcsController, EmulatedHardware, FrameProducer};
use clap::{App, Arg};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info, warn, Level};

const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
const READ_CHUNK: usize = 64;

/// Serial link emulated over the process's stdin/stdout.
struct StdioTransport {
    quit_byte: u8,
    quit: Arc<AtomicBool>,
    reader: Option<ReaderThread>,
    terminal: Option<RawTerminal>,
}

impl StdioTransport {
    fn new(quit_byte: u8, quit: Arc<AtomicBool>) -> Self {
        Self {
            quit_byte,
            quit,
            reader: None,
            terminal: None,
        }
    }
}

impl Transport for StdioTransport {
    fn init(&mut self, rx: FrameProducer) -> Result<(), TransportError> {
        if self.reader.is_some() {
            return Err(TransportError::AlreadyInitialised);
        }

        // Byte-at-a-time input, no echo onto the reply stream
        self.terminal = RawTerminal::stdin()?;
        let reader =
            ReaderThread::spawn(std::io::stdin(), rx, self.quit_byte, Arc::clone(&self.quit))?;
        self.reader = Some(reader);
        Ok(())
    }

    fn deinit(&mut self) {
        self.terminal = None;
        if let Some(reader) = self.reader.take() {
            if reader.release().is_none() {
                info!("stdin reader still blocked, leaving it to process exit");
            }
        }
    }

    fn transmit(&mut self, bytes: &[u8]) -> usize {
        let mut stdout = std::io::stdout().lock();
        match stdout.write_all(bytes).and_then(|()| stdout.flush()) {
            Ok(()) => bytes.len(),
            Err(e) => {
                warn!("stdout write failed: {}", e);
                0
            }
        }
    }
}

/// Serial link emulated over TCP, one OBC connection at a time.
struct TcpTransport {
    listener: Option<TcpListener>,
    quit_byte: u8,
    quit: Arc<AtomicBool>,
    outgoing: Option<mpsc::UnboundedSender<Vec<u8>>>,
    server: Option<JoinHandle<()>>,
}

impl TcpTransport {
    fn new(listener: TcpListener, quit_byte: u8, quit: Arc<AtomicBool>) -> Self {
        Self {
            listener: Some(listener),
            quit_byte,
            quit,
            outgoing: None,
            server: None,
        }
    }
}

impl Transport for TcpTransport {
    fn init(&mut self, rx: FrameProducer) -> Result<(), TransportError> {
        let listener = self.listener.take().ok_or(TransportError::AlreadyInitialised)?;
        let (tx, outgoing_rx) = mpsc::unbounded_channel();
        let quit_byte = self.quit_byte;
        let quit = Arc::clone(&self.quit);

        self.outgoing = Some(tx);
        self.server = Some(tokio::spawn(serve_obc(listener, rx, outgoing_rx, quit_byte, quit)));
        Ok(())
    }

    fn deinit(&mut self) {
        self.outgoing = None;
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }

    fn transmit(&mut self, bytes: &[u8]) -> usize {
        match &self.outgoing {
            Some(tx) if tx.send(bytes.to_vec()).is_ok() => bytes.len(),
            _ => 0,
        }
    }
}

async fn serve_obc(
    listener: TcpListener,
    rx: FrameProducer,
    mut outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
    quit_byte: u8,
    quit: Arc<AtomicBool>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };
        info!("OBC connected: {}", addr);

        // Replies queued while nobody was listening are stale
        while outgoing.try_recv().is_ok() {}

        match handle_obc(stream, &rx, &mut outgoing, quit_byte).await {
            Ok(true) => {
                info!("Quit byte received from {}", addr);
                quit.store(true, Ordering::Release);
                return;
            }
            Ok(false) => {}
            Err(e) => warn!("OBC {} error: {}", addr, e),
        }
        info!("OBC {} disconnected", addr);
    }
}

/// Pump one connection. Returns `true` when the quit byte was seen.
async fn handle_obc(
    mut stream: TcpStream,
    rx: &FrameProducer,
    outgoing: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    quit_byte: u8,
) -> std::io::Result<bool> {
    let (mut reader, mut writer) = stream.split();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    return Ok(false);
                }
                if let Some(at) = buf[..n].iter().position(|&b| b == quit_byte) {
                    rx.receive(&buf[..at]);
                    return Ok(true);
                }
                rx.receive(&buf[..n]);
            }
            Some(frame) = outgoing.recv() => {
                writer.write_all(&frame).await?;
            }
        }
    }
}

fn init_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    // stdout doubles as the serial link, keep logs off it
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

async fn run_loop<T: Transport>(
    mut controller: AdcsController<T, EmulatedHardware>,
    quit: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut interval = time::interval(Duration::from_millis(controller.config().poll_interval_ms));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = controller.run_pending() {
                    error!("Controller error: {}", e);
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Ctrl-C received");
                break;
            }
        }

        if quit.load(Ordering::Acquire) {
            // Serve whatever arrived before the quit byte
            controller.run_pending()?;
            break;
        }
    }

    info!("Session stats: {}", serde_json::to_string(controller.get_stats())?);
    let (_transport, hardware) = controller.shutdown();
    info!("Final hardware state: {}", serde_json::to_string(&hardware.get_state())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("adcs-emulator")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Space Systems Engineering Team")
        .about("Host emulation of the ADCS command front end")
        .arg(
            Arg::with_name("transport")
                .short("t")
                .long("transport")
                .value_name("TRANSPORT")
                .help("Link the OBC talks over")
                .takes_value(true)
                .possible_values(&["stdio", "tcp"])
                .default_value("stdio"),
        )
        .arg(
            Arg::with_name("listen")
                .short("l")
                .long("listen")
                .value_name("ADDR")
                .help("Listen address for the tcp transport")
                .takes_value(true)
                .default_value(DEFAULT_LISTEN),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Overrides the configured log level")
                .takes_value(true)
                .possible_values(&["error", "warn", "info", "debug", "trace"]),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => AdcsConfig::from_json_file(path)?,
        None => AdcsConfig::default(),
    };
    if let Some(level) = matches.value_of("log-level") {
        config.log_level = level.to_string();
    }
    init_tracing(&config.log_level);

    let quit = Arc::new(AtomicBool::new(false));
    let hardware = EmulatedHardware::new();

    eprintln!("ADCS OBC link emulator");
    eprintln!("======================");
    eprintln!("Message delimiter: '{}'", char::from(config.delimiter));
    eprintln!("Quit byte: {:#04x}, or Ctrl-C", config.quit_byte);

    match matches.value_of("transport").unwrap_or("stdio") {
        "tcp" => {
            let addr = matches.value_of("listen").unwrap_or(DEFAULT_LISTEN);
            let listener = TcpListener::bind(addr).await?;
            info!("Waiting for the OBC on {}", addr);

            let transport = TcpTransport::new(listener, config.quit_byte, Arc::clone(&quit));
            let controller = AdcsController::new(transport, hardware, config)?;
            run_loop(controller, quit).await?;
        }
        _ => {
            eprintln!("Type into the terminal to send raw bytes to the ADCS");
            let transport = StdioTransport::new(config.quit_byte, Arc::clone(&quit));
            let controller = AdcsController::new(transport, hardware, config)?;
            run_loop(controller, quit).await?;
        }
    }

    eprintln!("ADCS emulator stopped");
    Ok(())
}
