//! Entity hierarchy seeding from `space;building;sensor` CSV

use super::{
    entities::{BUILDING_TYPE, SPACE_TYPE},
    Database, Entity,
};
use crate::error::Result;
use tracing::{info, warn};

const SEPARATOR: char = ';';

#[derive(Debug, Clone, PartialEq, Eq)]
struct SeedRow<'a> {
    space: &'a str,
    building: &'a str,
    sensor: &'a str,
}

/// Rows after the header. Blank lines are ignored and short rows are
/// skipped with a warning.
fn parse_rows(input: &str) -> Vec<SeedRow<'_>> {
    input
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| {
            let columns: Vec<&str> = line.split(SEPARATOR).map(str::trim).collect();
            match columns.as_slice() {
                [space, building, sensor, ..] => Some(SeedRow {
                    space: *space,
                    building: *building,
                    sensor: *sensor,
                }),
                _ => {
                    warn!(
                        "skipping seed line {}: expected 3 columns, got {}",
                        index + 1,
                        columns.len()
                    );
                    None
                }
            }
        })
        .collect()
}

/// Add every space, building and sensor listed in `input`.
///
/// Returns the number of sensor rows applied. Sorted input avoids repeated
/// inserts of the same space or building; repeats are harmless either way.
pub async fn seed(db: &dyn Database, input: &str) -> Result<usize> {
    let rows = parse_rows(input);
    let mut last_space = "";
    let mut last_building = "";

    for row in &rows {
        if row.space != last_space {
            db.add_entity(&Entity::space(row.space)).await?;
            last_space = row.space;
        }

        if row.building != last_building {
            db.add_entity(&Entity::building(row.building).part_of(row.space, SPACE_TYPE))
                .await?;
            last_building = row.building;
        }

        db.add_entity(&Entity::sensor(row.sensor).part_of(row.building, BUILDING_TYPE))
            .await?;
    }

    info!("Seeded {} sensors", rows.len());
    Ok(rows.len())
}
