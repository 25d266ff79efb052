//! # Square-Grid Layout & Naming
//!
//! Children of one parent are placed on the smallest square grid that holds
//! them, walked row-major (x outer, y inner):
//!
//! ```text
//! n = 5, side = 3
//!
//!        y=0   y=1   y=2
//!  x=0 [  0  ][  1  ][  2  ]
//!  x=1 [  3  ][  4  ][  .  ]
//!  x=2 [  .  ][  .  ][  .  ]
//! ```
//!
//! Unused cells (`side² - n`) stay empty. Names come from the entity
//! type's pool, restarting at the first entry for every parent.

use orrery_shared::{EntityType, NewSpatialEntity, RunId, SpatialId};

/// `⌈√n⌉` in pure integer arithmetic.
#[must_use]
pub const fn grid_side(n: u32) -> u32 {
    if n <= 1 {
        return n;
    }
    // Newton iteration for ⌊√n⌋, then round up.
    let n64 = n as u64;
    let mut x = n64;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n64 / x) / 2;
    }
    if x * x == n64 {
        x as u32
    } else {
        x as u32 + 1
    }
}

/// Yields the first `n` cells of the `⌈√n⌉` grid.
#[derive(Clone, Debug)]
pub struct GridLayout {
    side: u32,
    remaining: u32,
    x: u32,
    y: u32,
}

impl GridLayout {
    /// Layout for `n` children.
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self {
            side: grid_side(n),
            remaining: n,
            x: 0,
            y: 0,
        }
    }

    /// Grid side length.
    #[inline]
    #[must_use]
    pub const fn side(&self) -> u32 {
        self.side
    }
}

impl Iterator for GridLayout {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        // side <= 65536, always fits.
        #[allow(clippy::cast_possible_wrap)]
        let cell = (self.x as i32, self.y as i32);
        self.y += 1;
        if self.y == self.side {
            self.y = 0;
            self.x += 1;
        }
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for GridLayout {}

/// Cycles through a name pool from its first entry.
#[derive(Clone, Debug)]
pub struct NameCursor {
    pool: &'static [&'static str],
    next: usize,
}

impl NameCursor {
    /// Cursor over the pool of `entity_type`.
    #[must_use]
    pub const fn for_type(entity_type: EntityType) -> Self {
        Self {
            pool: entity_type.name_pool(),
            next: 0,
        }
    }

    /// Name at position `i` (`pool[i mod len]`), without moving the cursor.
    #[must_use]
    pub fn name_at(&self, i: usize) -> &'static str {
        if self.pool.is_empty() {
            return "";
        }
        self.pool[i % self.pool.len()]
    }
}

impl Iterator for NameCursor {
    type Item = &'static str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pool.is_empty() {
            return None;
        }
        let name = self.name_at(self.next);
        self.next += 1;
        Some(name)
    }
}

/// Appends the `per_parent` child rows of `parent` to `out`.
pub fn push_parent_rows(
    run_id: RunId,
    parent: SpatialId,
    entity_type: EntityType,
    per_parent: u32,
    out: &mut Vec<NewSpatialEntity>,
) {
    let level = entity_type.level();
    let names = NameCursor::for_type(entity_type);
    out.reserve(per_parent as usize);

    for ((x, y), name) in GridLayout::new(per_parent).zip(names) {
        out.push(NewSpatialEntity {
            run_id,
            parent_id: Some(parent),
            entity_type,
            level,
            x_coord: x,
            y_coord: y,
            name: name.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_grid_side() {
        let cases = [
            (0, 0),
            (1, 1),
            (2, 2),
            (4, 2),
            (5, 3),
            (9, 3),
            (10, 4),
            (100, 10),
            (101, 11),
            (u32::MAX, 65536),
        ];
        for (n, side) in cases {
            assert_eq!(grid_side(n), side, "n = {n}");
        }
    }

    #[test]
    fn test_single_child_sits_at_origin() {
        let cells: Vec<_> = GridLayout::new(1).collect();
        assert_eq!(cells, vec![(0, 0)]);
    }

    #[test]
    fn test_two_children_share_first_row() {
        let cells: Vec<_> = GridLayout::new(2).collect();
        assert_eq!(cells, vec![(0, 0), (0, 1)]);
    }

    #[test]
    fn test_perfect_square_fills_grid() {
        let layout = GridLayout::new(9);
        assert_eq!(layout.side(), 3);
        let cells: HashSet<_> = layout.collect();
        assert_eq!(cells.len(), 9);
        for x in 0..3 {
            for y in 0..3 {
                assert!(cells.contains(&(x, y)));
            }
        }
    }

    #[test]
    fn test_row_major_x_outer() {
        let cells: Vec<_> = GridLayout::new(5).collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_cells_are_unique_and_inside_grid() {
        for n in 1..200 {
            let layout = GridLayout::new(n);
            let side = layout.side() as i32;
            let cells: Vec<_> = layout.collect();
            assert_eq!(cells.len(), n as usize);
            let unique: HashSet<_> = cells.iter().copied().collect();
            assert_eq!(unique.len(), cells.len());
            assert!(cells.iter().all(|&(x, y)| x < side && y < side));
        }
    }

    #[test]
    fn test_names_wrap_around_pool() {
        let names: Vec<_> = NameCursor::for_type(EntityType::Galaxy).take(8).collect();
        assert_eq!(
            names,
            vec![
                "Andromeda",
                "Milky Way",
                "Centaurus",
                "Pegasus",
                "Cygnus",
                "Draco",
                "Andromeda",
                "Milky Way",
            ]
        );
    }

    #[test]
    fn test_universe_pool_is_empty() {
        let mut cursor = NameCursor::for_type(EntityType::Universe);
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.name_at(3), "");
    }

    #[test]
    fn test_rows_per_parent_restart_names() {
        let mut rows = Vec::new();
        push_parent_rows(7, 100, EntityType::Sector, 3, &mut rows);
        push_parent_rows(7, 101, EntityType::Sector, 3, &mut rows);

        assert_eq!(rows.len(), 6);
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma", "Alpha", "Beta", "Gamma"]);
        assert!(rows[..3].iter().all(|r| r.parent_id == Some(100)));
        assert!(rows[3..].iter().all(|r| r.parent_id == Some(101)));
        assert!(rows.iter().all(|r| r.level == 2 && r.run_id == 7));
        assert_eq!((rows[2].x_coord, rows[2].y_coord), (1, 0));
    }
}
