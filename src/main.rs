use std::{
    fs,
    path::{Path, PathBuf},
    process,
    time::{SystemTime, UNIX_EPOCH},
};

use clap::{Parser, Subcommand};

use canvas_ledger::{
    CallContext, CanvasEvent, CanvasSnapshot, CanvasState, EventSink, TokenAction,
};

#[derive(Parser)]
#[command(name = "canvas-ledger", version, about = "Shared pixel canvas ledger")]
struct Cli {
    /// JSON snapshot file holding canvas state between invocations.
    #[arg(long, default_value = "canvas.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a fresh canvas owned by the given address.
    Init {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        size: u32,
        /// Fee per pixel in smallest fee-token units.
        #[arg(long)]
        fee: u64,
    },
    /// Paint one pixel, depositing the fee.
    Paint {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        x: i64,
        #[arg(long)]
        y: i64,
        /// Color in '#RRGGBB' format.
        #[arg(long)]
        color: String,
        /// Deposited amount; anything above the fee is kept as revenue.
        #[arg(long)]
        deposit: u64,
        /// Override the wall-clock timestamp (seconds).
        #[arg(long)]
        timestamp: Option<u64>,
    },
    /// Paint up to 32 pixels atomically with a single deposit.
    PaintBatch {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        deposit: u64,
        #[arg(long)]
        timestamp: Option<u64>,
        /// Repeatable pixel entry, e.g. --pixel "3,4,#aabbcc".
        #[arg(long = "pixel", value_name = "X,Y,#RRGGBB", required = true)]
        pixels: Vec<String>,
    },
    /// Withdraw collected fees (owner only).
    Withdraw {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        amount: u64,
    },
    /// Show one pixel's color, painter, and paint time.
    Pixel {
        #[arg(long)]
        x: i64,
        #[arg(long)]
        y: i64,
    },
    /// Show the paint counter and collected fees.
    Stats,
    /// Show owner, canvas size, fee, and counters.
    Status,
    /// List painted pixels in first-paint order, one JSON line each.
    Page {
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
}

/// Prints every paint notification as a JSON line, best effort.
struct EventPrinter;

impl EventSink for EventPrinter {
    fn emit(&mut self, event: &CanvasEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(2)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn load_canvas(path: &Path) -> CanvasState {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => fail(format!("cannot read {}: {err}", path.display())),
    };
    let snapshot: CanvasSnapshot = match serde_json::from_slice(&bytes) {
        Ok(snapshot) => snapshot,
        Err(err) => fail(format!("cannot parse {}: {err}", path.display())),
    };
    match CanvasState::from_snapshot(&snapshot) {
        Ok(canvas) => canvas,
        Err(err) => fail(format!("corrupt state in {}: {err}", path.display())),
    }
}

fn save_canvas(path: &Path, canvas: &CanvasState) {
    let json = match serde_json::to_vec_pretty(&canvas.snapshot()) {
        Ok(json) => json,
        Err(err) => fail(format!("cannot encode state: {err}")),
    };
    if let Err(err) = fs::write(path, json) {
        fail(format!("cannot write {}: {err}", path.display()));
    }
}

fn parse_pixel(entry: &str) -> (i64, i64, String) {
    let mut parts = entry.splitn(3, ',');
    let x = parts.next().and_then(|s| s.trim().parse().ok());
    let y = parts.next().and_then(|s| s.trim().parse().ok());
    let color = parts.next().map(|s| s.trim().to_string());
    match (x, y, color) {
        (Some(x), Some(y), Some(color)) => (x, y, color),
        _ => fail(format!("invalid --pixel {entry:?}, expected X,Y,#RRGGBB")),
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Init { owner, size, fee } => {
            // Single initialization is the host's job; refuse to clobber.
            if cli.state.exists() {
                fail(format!("{} already exists", cli.state.display()));
            }
            let canvas = CanvasState::initialize(&CallContext::new(owner, now_secs()), size, fee);
            save_canvas(&cli.state, &canvas);
            println!("canvas {size}x{size} → {}", cli.state.display());
        }
        Command::Paint {
            caller,
            x,
            y,
            color,
            deposit,
            timestamp,
        } => {
            let mut canvas = load_canvas(&cli.state);
            let ctx = CallContext::new(caller, timestamp.unwrap_or_else(now_secs))
                .with_action(TokenAction::Deposit { amount: deposit });
            if let Err(err) = canvas.paint(&ctx, x, y, &color, &mut EventPrinter) {
                fail(err);
            }
            save_canvas(&cli.state, &canvas);
            println!("painted ({x}, {y}) → {color}");
        }
        Command::PaintBatch {
            caller,
            deposit,
            timestamp,
            pixels,
        } => {
            let mut canvas = load_canvas(&cli.state);
            let mut xs = Vec::with_capacity(pixels.len());
            let mut ys = Vec::with_capacity(pixels.len());
            let mut colors = Vec::with_capacity(pixels.len());
            for entry in &pixels {
                let (x, y, color) = parse_pixel(entry);
                xs.push(x);
                ys.push(y);
                colors.push(color);
            }
            let ctx = CallContext::new(caller, timestamp.unwrap_or_else(now_secs))
                .with_action(TokenAction::Deposit { amount: deposit });
            if let Err(err) = canvas.paint_batch(&ctx, &xs, &ys, &colors, &mut EventPrinter) {
                fail(err);
            }
            save_canvas(&cli.state, &canvas);
            println!("painted {} pixels", xs.len());
        }
        Command::Withdraw { caller, amount } => {
            let mut canvas = load_canvas(&cli.state);
            let ctx = CallContext::new(caller, now_secs())
                .with_action(TokenAction::Withdrawal { amount });
            if let Err(err) = canvas.withdraw_fees(&ctx) {
                fail(err);
            }
            save_canvas(&cli.state, &canvas);
            println!(
                "withdrawn {amount} (remaining {})",
                canvas.stats().fees_collected
            );
        }
        Command::Pixel { x, y } => {
            let canvas = load_canvas(&cli.state);
            match canvas.pixel_info(x, y) {
                Some(cell) => println!(
                    "({x}, {y}) {} painted by {} at {}",
                    cell.color, cell.painter, cell.painted_at
                ),
                None => println!("({x}, {y}) not painted"),
            }
        }
        Command::Stats => {
            let canvas = load_canvas(&cli.state);
            let stats = canvas.stats();
            println!("paint_count: {}", stats.paint_count);
            println!("fees_collected: {}", stats.fees_collected);
        }
        Command::Status => {
            let canvas = load_canvas(&cli.state);
            let stats = canvas.stats();
            println!("owner: {}", canvas.owner());
            println!("size: {0}x{0}", canvas.canvas_size());
            println!("fee_per_pixel: {}", canvas.paint_fee());
            println!("paint_count: {}", stats.paint_count);
            println!("fees_collected: {}", stats.fees_collected);
            println!("pixels_painted: {}", canvas.pixels_count());
        }
        Command::Page { offset, limit } => {
            let canvas = load_canvas(&cli.state);
            let page = match canvas.pixels_page(offset, limit) {
                Ok(page) => page,
                Err(err) => fail(err),
            };
            for pixel in &page {
                if let Ok(line) = serde_json::to_string(pixel) {
                    println!("{line}");
                }
            }
        }
    }
}
