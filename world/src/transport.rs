//! Text transport format for lot layouts.
//!
//! A layout travels as `lot:v1:<W>x<H>:<payload>` where the payload is the
//! unpadded base64 encoding of the [`GridTransport`] JSON document.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use parkade_core::{BorderKind, CellCoord, CellData, Edge, SpawnerPair};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TRANSPORT_DOMAIN: &str = "lot";
const TRANSPORT_VERSION: &str = "v1";
const FIELD_DELIMITER: char = ':';

/// Serializable description of a lot layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridTransport {
    /// Number of columns the layout was authored for.
    pub width: u32,
    /// Number of rows the layout was authored for.
    pub height: u32,
    /// Populated cells as `(column, row, record)`, sorted by coordinate.
    pub cells: Vec<(u32, u32, CellData)>,
    /// Border segments as `(column, row, edge, kind)`, sorted.
    pub segments: Vec<(u32, u32, Edge, BorderKind)>,
    /// Vehicle spawner pairs as `[spawn_x, spawn_y, despawn_x, despawn_y]`.
    pub vehicle_spawners: Vec<[u32; 4]>,
    /// Pedestrian destinations as `(column, row)`.
    pub pedestrian_destinations: Vec<(u32, u32)>,
}

impl GridTransport {
    /// Leading text shared by every encoded layout.
    pub const PREFIX: &'static str = "lot:v1:";

    /// Encodes the layout into a single-line string.
    pub fn encode(&self) -> Result<String, TransportError> {
        let json = serde_json::to_vec(self).map_err(TransportError::InvalidPayload)?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!(
            "{TRANSPORT_DOMAIN}{FIELD_DELIMITER}{TRANSPORT_VERSION}{FIELD_DELIMITER}{}x{}{FIELD_DELIMITER}{encoded}",
            self.width, self.height
        ))
    }

    /// Decodes and validates a layout string.
    pub fn decode(value: &str) -> Result<Self, TransportError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TransportError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(TransportError::MissingPrefix)?;
        let version = parts.next().ok_or(TransportError::MissingVersion)?;
        let dimensions = parts.next().ok_or(TransportError::MissingDimensions)?;
        let payload = parts.next().ok_or(TransportError::MissingPayload)?;

        if domain != TRANSPORT_DOMAIN {
            return Err(TransportError::InvalidPrefix(domain.to_owned()));
        }
        if version != TRANSPORT_VERSION {
            return Err(TransportError::UnsupportedVersion(version.to_owned()));
        }

        let (width, height) = parse_dimensions(dimensions)?;
        let bytes = STANDARD_NO_PAD.decode(payload.as_bytes())?;
        let transport: GridTransport =
            serde_json::from_slice(&bytes).map_err(TransportError::InvalidPayload)?;

        if (transport.width, transport.height) != (width, height) {
            return Err(TransportError::DimensionMismatch {
                header: (width, height),
                payload: (transport.width, transport.height),
            });
        }
        transport.validate()?;
        Ok(transport)
    }

    /// Checks that every entry lies inside the declared dimensions and that
    /// fixtures are consistent with the cells that carry them.
    pub fn validate(&self) -> Result<(), TransportError> {
        let inside = |column: u32, row: u32| -> Result<CellCoord, TransportError> {
            let cell = CellCoord::new(column, row);
            if cell.is_within(self.width, self.height) {
                Ok(cell)
            } else {
                Err(TransportError::EntryOutOfBounds { column, row })
            }
        };

        for (column, row, data) in &self.cells {
            let cell = inside(*column, *row)?;
            if let Some(fixture) = data.fixture {
                let adjacent_secondary = fixture
                    .secondary
                    .map_or(true, |secondary| cell.manhattan_distance(secondary) == 1);
                let expected_cells = if fixture.secondary.is_some() { 2 } else { 1 };
                if fixture.anchor != cell
                    || !adjacent_secondary
                    || fixture.kind.rules().footprint != expected_cells
                {
                    return Err(TransportError::InvalidFixture {
                        column: *column,
                        row: *row,
                    });
                }
                if let Some(secondary) = fixture.secondary {
                    let _ = inside(secondary.column(), secondary.row())?;
                }
            }
        }
        self.validate_secondary_cells()?;
        for (column, row, _, _) in &self.segments {
            let _ = inside(*column, *row)?;
        }
        for [spawn_x, spawn_y, despawn_x, despawn_y] in &self.vehicle_spawners {
            let _ = inside(*spawn_x, *spawn_y)?;
            let _ = inside(*despawn_x, *despawn_y)?;
        }
        for (column, row) in &self.pedestrian_destinations {
            let _ = inside(*column, *row)?;
        }
        Ok(())
    }

    /// Second cells of two-cell fixtures must be free of other fixtures and
    /// may only point back at the fixture that covers them.
    fn validate_secondary_cells(&self) -> Result<(), TransportError> {
        let records: BTreeMap<CellCoord, &CellData> = self
            .cells
            .iter()
            .map(|(column, row, data)| (CellCoord::new(*column, *row), data))
            .collect();
        let mut claimed: BTreeMap<CellCoord, CellCoord> = BTreeMap::new();

        for (anchor, data) in &records {
            let Some(secondary) = data.fixture.and_then(|fixture| fixture.secondary) else {
                continue;
            };
            let invalid = TransportError::InvalidFixture {
                column: secondary.column(),
                row: secondary.row(),
            };
            if claimed.insert(secondary, *anchor).is_some() {
                return Err(invalid);
            }
            if let Some(record) = records.get(&secondary) {
                let foreign_owner = record.occupied_by.map_or(false, |owner| owner != *anchor);
                if record.fixture.is_some() || foreign_owner {
                    return Err(invalid);
                }
            }
        }
        Ok(())
    }

    /// Spawner pairs carried by the layout.
    pub fn spawner_pairs(&self) -> impl Iterator<Item = SpawnerPair> + '_ {
        self.vehicle_spawners.iter().map(|[sx, sy, dx, dy]| {
            SpawnerPair::new(CellCoord::new(*sx, *sy), CellCoord::new(*dx, *dy))
        })
    }
}

/// Errors raised while decoding a layout string.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The string was empty or whitespace.
    #[error("layout string is empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("layout string is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("layout string is missing the version")]
    MissingVersion,
    /// The dimensions segment was missing.
    #[error("layout string is missing the grid dimensions")]
    MissingDimensions,
    /// The payload segment was missing.
    #[error("layout string is missing the payload")]
    MissingPayload,
    /// The prefix did not name a lot layout.
    #[error("layout prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The version is unknown.
    #[error("layout version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The dimensions segment could not be parsed.
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    /// Header and payload disagree on the grid size.
    #[error("header declares {header:?} but payload declares {payload:?}")]
    DimensionMismatch {
        /// Dimensions from the header.
        header: (u32, u32),
        /// Dimensions from the payload.
        payload: (u32, u32),
    },
    /// The base64 payload could not be decoded.
    #[error("could not decode layout payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    /// The JSON document could not be read or written.
    #[error("could not parse layout payload: {0}")]
    InvalidPayload(serde_json::Error),
    /// An entry lies outside the payload's own dimensions.
    #[error("entry at ({column}, {row}) lies outside the layout")]
    EntryOutOfBounds {
        /// Column of the entry.
        column: u32,
        /// Row of the entry.
        row: u32,
    },
    /// A fixture disagrees with the cell that stores it.
    #[error("fixture stored at ({column}, {row}) is inconsistent")]
    InvalidFixture {
        /// Column of the cell.
        column: u32,
        /// Row of the cell.
        row: u32,
    },
}

fn parse_dimensions(value: &str) -> Result<(u32, u32), TransportError> {
    let invalid = || TransportError::InvalidDimensions(value.to_owned());
    let (width, height) = value.split_once('x').ok_or_else(invalid)?;
    let width = width.parse::<u32>().map_err(|_| invalid())?;
    let height = height.parse::<u32>().map_err(|_| invalid())?;
    Ok((width, height))
}
