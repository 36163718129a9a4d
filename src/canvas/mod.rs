use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::host::{CallContext, CanvasEvent, EventSink, TokenAction};

pub type Address = String;
pub type Amount = u64;
pub type Timestamp = u64;

pub const MAX_BATCH_SIZE: usize = 32;
pub const MAX_PIXELS_PAGE_SIZE: i64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("coordinates ({x}, {y}) are outside the {size}x{size} canvas")]
    OutOfBounds { x: i64, y: i64, size: u32 },
    #[error("color {color:?} is not a '#RRGGBB' hex color")]
    InvalidColorFormat { color: String },
    #[error("batch needs 1..={MAX_BATCH_SIZE} equal-length coordinate and color lists, got {xs}/{ys}/{colors}")]
    EmptyBatch { xs: usize, ys: usize, colors: usize },
    #[error("a deposit of at least {required} fee units is required to paint")]
    FeeRequired { required: Amount },
    #[error("only the owner can withdraw fees")]
    Unauthorized,
    #[error("a withdrawal action is required")]
    InvalidAction,
    #[error("withdrawal of {requested} exceeds the {available} collected fees")]
    OverWithdrawal { requested: Amount, available: Amount },
    #[error("page offset must be non-negative and limit within 1..={MAX_PIXELS_PAGE_SIZE}, got offset {offset} and limit {limit}")]
    PageOutOfRange { offset: i64, limit: i64 },
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot digest does not match its contents")]
    DigestMismatch,
    #[error("snapshot lists cell ({x}, {y}) more than once")]
    DuplicateCell { x: u32, y: u32 },
    #[error("snapshot cell ({x}, {y}) lies outside the {size}x{size} canvas")]
    CellOutOfBounds { x: u32, y: u32, size: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cell {
    pub color: String,
    pub painter: Address,
    pub painted_at: Timestamp,
}

/// One entry of a pixel page: a painted coordinate and its current color.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaintedPixel {
    pub x: u32,
    pub y: u32,
    pub color: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanvasStats {
    pub paint_count: u64,
    pub fees_collected: Amount,
}

/// The canvas ledger: a `size x size` grid of cells, the fee bookkeeping,
/// and the first-paint index behind stable pagination. The host invokes one
/// command at a time; a failed command leaves the state untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanvasState {
    owner: Address,
    size: u32,
    fee_per_pixel: Amount,
    paint_count: u64,
    fees_collected: Amount,
    cells: BTreeMap<Coord, Cell>,
    painted_order: Vec<Coord>,
}

impl CanvasState {
    /// Creates the canvas, recording the calling identity as owner. Size and
    /// fee are taken as given; the host decides what configurations to allow.
    pub fn initialize(ctx: &CallContext, size: u32, fee_per_pixel: Amount) -> Self {
        Self {
            owner: ctx.caller.clone(),
            size,
            fee_per_pixel,
            paint_count: 0,
            fees_collected: 0,
            cells: BTreeMap::new(),
            painted_order: Vec::new(),
        }
    }

    pub fn paint(
        &mut self,
        ctx: &CallContext,
        x: i64,
        y: i64,
        color: &str,
        sink: &mut dyn EventSink,
    ) -> Result<(), CanvasError> {
        let paid = match ctx.action {
            Some(TokenAction::Deposit { amount }) => amount,
            _ => {
                return Err(CanvasError::FeeRequired {
                    required: self.fee_per_pixel,
                })
            }
        };
        if paid < self.fee_per_pixel {
            return Err(CanvasError::FeeRequired {
                required: self.fee_per_pixel,
            });
        }

        let coord = self.validate_pixel(x, y, color)?;
        self.apply_paint(coord, color, &ctx.caller, ctx.timestamp, paid, sink);
        self.paint_count += 1;
        self.fees_collected = self.fees_collected.saturating_add(paid);
        Ok(())
    }

    pub fn paint_batch(
        &mut self,
        ctx: &CallContext,
        xs: &[i64],
        ys: &[i64],
        colors: &[String],
        sink: &mut dyn EventSink,
    ) -> Result<(), CanvasError> {
        if xs.len() != ys.len() || xs.len() != colors.len() {
            return Err(CanvasError::EmptyBatch {
                xs: xs.len(),
                ys: ys.len(),
                colors: colors.len(),
            });
        }
        let n = xs.len();
        if n == 0 || n > MAX_BATCH_SIZE {
            return Err(CanvasError::EmptyBatch {
                xs: n,
                ys: n,
                colors: n,
            });
        }

        let required = self.fee_per_pixel.saturating_mul(n as Amount);
        let paid = match ctx.action {
            Some(TokenAction::Deposit { amount }) => amount,
            _ => return Err(CanvasError::FeeRequired { required }),
        };
        if paid < required {
            return Err(CanvasError::FeeRequired { required });
        }

        // Validate every element before touching state so a bad entry
        // anywhere aborts the whole batch with nothing applied and no
        // events emitted.
        let mut coords = Vec::with_capacity(n);
        for i in 0..n {
            coords.push(self.validate_pixel(xs[i], ys[i], &colors[i])?);
        }

        let fee = self.fee_per_pixel;
        for (coord, color) in coords.iter().zip(colors) {
            self.apply_paint(*coord, color, &ctx.caller, ctx.timestamp, fee, sink);
        }
        self.paint_count += n as u64;
        self.fees_collected = self.fees_collected.saturating_add(paid);
        Ok(())
    }

    pub fn withdraw_fees(&mut self, ctx: &CallContext) -> Result<(), CanvasError> {
        if ctx.caller != self.owner {
            return Err(CanvasError::Unauthorized);
        }
        let requested = match ctx.action {
            Some(TokenAction::Withdrawal { amount }) => amount,
            _ => return Err(CanvasError::InvalidAction),
        };
        if requested > self.fees_collected {
            return Err(CanvasError::OverWithdrawal {
                requested,
                available: self.fees_collected,
            });
        }
        self.fees_collected -= requested;
        Ok(())
    }

    pub fn pixel_info(&self, x: i64, y: i64) -> Option<&Cell> {
        let coord = Coord {
            x: u32::try_from(x).ok()?,
            y: u32::try_from(y).ok()?,
        };
        self.cells.get(&coord)
    }

    pub fn stats(&self) -> CanvasStats {
        CanvasStats {
            paint_count: self.paint_count,
            fees_collected: self.fees_collected,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn canvas_size(&self) -> u32 {
        self.size
    }

    pub fn paint_fee(&self) -> Amount {
        self.fee_per_pixel
    }

    pub fn pixels_count(&self) -> usize {
        self.painted_order.len()
    }

    /// Returns the `[offset, offset+limit)` slice of the first-paint index,
    /// each coordinate paired with its current color. The index is
    /// append-only and never reordered, so pages stay stable while new
    /// paints land behind them.
    pub fn pixels_page(&self, offset: i64, limit: i64) -> Result<Vec<PaintedPixel>, CanvasError> {
        if offset < 0 || limit <= 0 || limit > MAX_PIXELS_PAGE_SIZE {
            return Err(CanvasError::PageOutOfRange { offset, limit });
        }
        let total = self.painted_order.len();
        let start = offset as usize;
        if start >= total {
            return Ok(Vec::new());
        }
        let end = total.min(start.saturating_add(limit as usize));
        let page = self.painted_order[start..end]
            .iter()
            .map(|coord| {
                let cell = &self.cells[coord];
                PaintedPixel {
                    x: coord.x,
                    y: coord.y,
                    color: cell.color.clone(),
                }
            })
            .collect();
        Ok(page)
    }

    pub fn snapshot(&self) -> CanvasSnapshot {
        let cells: Vec<SnapshotCell> = self
            .painted_order
            .iter()
            .map(|coord| {
                let cell = &self.cells[coord];
                SnapshotCell {
                    x: coord.x,
                    y: coord.y,
                    color: cell.color.clone(),
                    painter: cell.painter.clone(),
                    painted_at: cell.painted_at,
                }
            })
            .collect();
        let digest = state_digest(
            &self.owner,
            self.size,
            self.fee_per_pixel,
            self.paint_count,
            self.fees_collected,
            &cells,
        );
        CanvasSnapshot {
            owner: self.owner.clone(),
            size: self.size,
            fee_per_pixel: self.fee_per_pixel,
            paint_count: self.paint_count,
            fees_collected: self.fees_collected,
            cells,
            digest,
        }
    }

    /// Rebuilds a canvas from a snapshot, verifying the digest and the
    /// cell-index invariants.
    pub fn from_snapshot(snapshot: &CanvasSnapshot) -> Result<Self, SnapshotError> {
        let digest = state_digest(
            &snapshot.owner,
            snapshot.size,
            snapshot.fee_per_pixel,
            snapshot.paint_count,
            snapshot.fees_collected,
            &snapshot.cells,
        );
        if digest != snapshot.digest {
            return Err(SnapshotError::DigestMismatch);
        }

        let mut cells = BTreeMap::new();
        let mut painted_order = Vec::with_capacity(snapshot.cells.len());
        for entry in &snapshot.cells {
            if entry.x >= snapshot.size || entry.y >= snapshot.size {
                return Err(SnapshotError::CellOutOfBounds {
                    x: entry.x,
                    y: entry.y,
                    size: snapshot.size,
                });
            }
            let coord = Coord {
                x: entry.x,
                y: entry.y,
            };
            let replaced = cells.insert(
                coord,
                Cell {
                    color: entry.color.clone(),
                    painter: entry.painter.clone(),
                    painted_at: entry.painted_at,
                },
            );
            if replaced.is_some() {
                return Err(SnapshotError::DuplicateCell {
                    x: entry.x,
                    y: entry.y,
                });
            }
            painted_order.push(coord);
        }

        Ok(Self {
            owner: snapshot.owner.clone(),
            size: snapshot.size,
            fee_per_pixel: snapshot.fee_per_pixel,
            paint_count: snapshot.paint_count,
            fees_collected: snapshot.fees_collected,
            cells,
            painted_order,
        })
    }

    // Bounds before color; the first failing check wins.
    fn validate_pixel(&self, x: i64, y: i64, color: &str) -> Result<Coord, CanvasError> {
        let size = i64::from(self.size);
        if !(0..size).contains(&x) || !(0..size).contains(&y) {
            return Err(CanvasError::OutOfBounds {
                x,
                y,
                size: self.size,
            });
        }
        if color.len() != 7 || !color.starts_with('#') || hex::decode(&color[1..]).is_err() {
            return Err(CanvasError::InvalidColorFormat {
                color: color.to_string(),
            });
        }
        Ok(Coord {
            x: x as u32,
            y: y as u32,
        })
    }

    fn apply_paint(
        &mut self,
        coord: Coord,
        color: &str,
        painter: &str,
        timestamp: Timestamp,
        fee: Amount,
        sink: &mut dyn EventSink,
    ) {
        // First paint of a coordinate registers it in the page index; later
        // paints only rewrite the cell.
        if !self.cells.contains_key(&coord) {
            self.painted_order.push(coord);
        }
        self.cells.insert(
            coord,
            Cell {
                color: color.to_string(),
                painter: painter.to_string(),
                painted_at: timestamp,
            },
        );
        sink.emit(&CanvasEvent::Paint {
            x: coord.x,
            y: coord.y,
            color: color.to_string(),
            fee,
        });
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotCell {
    pub x: u32,
    pub y: u32,
    pub color: String,
    pub painter: Address,
    pub painted_at: Timestamp,
}

/// Full canvas state in first-paint order plus a sha2-256 digest, suitable
/// for persistence between host invocations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanvasSnapshot {
    pub owner: Address,
    pub size: u32,
    pub fee_per_pixel: Amount,
    pub paint_count: u64,
    pub fees_collected: Amount,
    pub cells: Vec<SnapshotCell>,
    #[serde(with = "digest_hex")]
    pub digest: [u8; 32],
}

fn state_digest(
    owner: &str,
    size: u32,
    fee_per_pixel: Amount,
    paint_count: u64,
    fees_collected: Amount,
    cells: &[SnapshotCell],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"canvas-snapshot-v1");
    hasher.update((owner.len() as u64).to_le_bytes());
    hasher.update(owner.as_bytes());
    hasher.update(size.to_le_bytes());
    hasher.update(fee_per_pixel.to_le_bytes());
    hasher.update(paint_count.to_le_bytes());
    hasher.update(fees_collected.to_le_bytes());
    hasher.update((cells.len() as u64).to_le_bytes());
    for cell in cells {
        hasher.update(cell.x.to_le_bytes());
        hasher.update(cell.y.to_le_bytes());
        hasher.update(cell.color.as_bytes());
        hasher.update((cell.painter.len() as u64).to_le_bytes());
        hasher.update(cell.painter.as_bytes());
        hasher.update(cell.painted_at.to_le_bytes());
    }
    hasher.finalize().into()
}

pub(crate) mod digest_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| D::Error::custom("digest must be 32 bytes"))
    }
}
