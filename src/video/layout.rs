//! Raster-Layout für Remote-Videos
//!
//! Quadratische Kacheln, deren Kantenlänge sich aus der Containerbreite
//! ergibt. Jede Zeile wird für sich horizontal zentriert, der ganze Block
//! vertikal.

use crate::config::VideoLayoutParams;

/// Berechnet die Position aller `n` Kacheln im Container
///
/// Die Reihenfolge entspricht der Ankunftsreihenfolge der Tracks:
/// links nach rechts, oben nach unten.
pub fn grid_layout(n: usize, container: &VideoLayoutParams) -> Vec<VideoLayoutParams> {
    if n == 0 {
        return Vec::new();
    }

    let rows = if n < 9 { 2 } else { 3 };
    let per_row = if n == 2 { 2 } else { n.div_ceil(rows) };
    let size = container.width / per_row as i32;
    let actual_rows = n.div_ceil(per_row);

    let mut tiles = Vec::with_capacity(n);
    let mut y = center(actual_rows, size, container.height) + container.y;

    for row in 0..actual_rows {
        let in_row = if row + 1 == actual_rows {
            n - per_row * (actual_rows - 1)
        } else {
            per_row
        };

        let mut x = center(in_row, size, container.width) + container.x;
        for _ in 0..in_row {
            tiles.push(VideoLayoutParams::new(x, y, size, size));
            x += size;
        }

        y += size;
    }

    tiles
}

/// Startversatz, um `count` Kacheln in `container_size` zu zentrieren
fn center(count: usize, size: i32, container_size: i32) -> i32 {
    ((container_size - size * count as i32) as f64 / 2.0).round() as i32
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> VideoLayoutParams {
        VideoLayoutParams::new(0, 0, 300, 600)
    }

    #[test]
    fn test_empty() {
        assert!(grid_layout(0, &container()).is_empty());
    }

    #[test]
    fn test_single_tile_fills_width() {
        let square = VideoLayoutParams::new(0, 0, 300, 300);
        assert_eq!(
            grid_layout(1, &square),
            vec![VideoLayoutParams::new(0, 0, 300, 300)]
        );

        // Vertikal zentriert im hohen Container
        assert_eq!(
            grid_layout(1, &container()),
            vec![VideoLayoutParams::new(0, 150, 300, 300)]
        );
    }

    #[test]
    fn test_two_tiles_share_one_row() {
        assert_eq!(
            grid_layout(2, &container()),
            vec![
                VideoLayoutParams::new(0, 225, 150, 150),
                VideoLayoutParams::new(150, 225, 150, 150),
            ]
        );
    }

    #[test]
    fn test_four_tiles_two_by_two() {
        let tiles = grid_layout(4, &container());
        assert_eq!(
            tiles,
            vec![
                VideoLayoutParams::new(0, 150, 150, 150),
                VideoLayoutParams::new(150, 150, 150, 150),
                VideoLayoutParams::new(0, 300, 150, 150),
                VideoLayoutParams::new(150, 300, 150, 150),
            ]
        );
    }

    #[test]
    fn test_five_tiles_center_partial_row() {
        let tiles = grid_layout(5, &container());
        assert_eq!(tiles.len(), 5);

        // 3 pro Zeile, Kante 100, zwei Zeilen
        assert!(tiles.iter().all(|t| t.width == 100 && t.height == 100));
        assert_eq!(tiles[0], VideoLayoutParams::new(0, 200, 100, 100));
        assert_eq!(tiles[1], VideoLayoutParams::new(100, 200, 100, 100));
        assert_eq!(tiles[2], VideoLayoutParams::new(200, 200, 100, 100));
        assert_eq!(tiles[3], VideoLayoutParams::new(50, 300, 100, 100));
        assert_eq!(tiles[4], VideoLayoutParams::new(150, 300, 100, 100));
    }

    #[test]
    fn test_nine_tiles_use_three_rows() {
        let tiles = grid_layout(9, &VideoLayoutParams::new(0, 0, 300, 300));
        assert_eq!(tiles.len(), 9);
        assert_eq!(tiles[0], VideoLayoutParams::new(0, 0, 100, 100));
        assert_eq!(tiles[4], VideoLayoutParams::new(100, 100, 100, 100));
        assert_eq!(tiles[8], VideoLayoutParams::new(200, 200, 100, 100));
    }

    #[test]
    fn test_container_origin_offsets_tiles() {
        let tiles = grid_layout(3, &VideoLayoutParams::new(10, 20, 200, 200));

        // 2 pro Zeile, Kante 100: volle Zeile, dann eine zentrierte Kachel
        assert_eq!(
            tiles,
            vec![
                VideoLayoutParams::new(10, 20, 100, 100),
                VideoLayoutParams::new(110, 20, 100, 100),
                VideoLayoutParams::new(60, 120, 100, 100),
            ]
        );
    }

    #[test]
    fn test_rounding_of_odd_remainders() {
        // 7 Kacheln: 4 pro Zeile, Kante 25, halbe Pixel werden aufgerundet
        let tiles = grid_layout(7, &VideoLayoutParams::new(0, 0, 101, 51));
        assert_eq!(tiles[0], VideoLayoutParams::new(1, 1, 25, 25));
        assert_eq!(tiles[4], VideoLayoutParams::new(13, 26, 25, 25));
    }
}
