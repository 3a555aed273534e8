use super::*;
use crate::geometry::Cube;
use crate::types::{LatticeError, Xy, Xyz};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn e(x: i32, y: i32) -> Eisenstein {
    Eisenstein::new(x, y)
}

#[test]
fn divide_by_unit_has_smaller_remainder() {
    let a = e(2, -1);
    let d = e(1, 1);
    let (q, r) = a.div_rem(d).unwrap();
    assert_eq!(q * d + r, a);
    assert!(r.norm() < d.norm());
}

#[test]
fn divide_by_zero_fails_but_remainder_is_total() {
    assert_eq!(e(3, 1).div_rem(Eisenstein::ZERO), Err(LatticeError::DivideByZero));
    assert_eq!(e(3, 1).checked_div(Eisenstein::ZERO), Err(LatticeError::DivideByZero));
    assert_eq!(e(3, 1) % Eisenstein::ZERO, e(3, 1));
}

#[test]
fn units_rotate_by_sixty_degrees() {
    for (i, u) in UNITS.iter().enumerate() {
        assert_eq!(u.norm(), 1);
        assert_eq!(*u * UNITS[1], UNITS[(i + 1) % 6]);
    }
    assert_eq!(Eisenstein::OMEGA * Eisenstein::OMEGA * Eisenstein::OMEGA, Eisenstein::ONE);
    assert_eq!(e(2, 1).rotate(6), e(2, 1));
}

#[test]
fn conjugate_gives_norm() {
    for p in Eisenstein::hexagon(4) {
        assert_eq!(p * p.conj(), e(p.norm() as i32, 0));
    }
}

#[test]
fn map_order_is_row_major() {
    assert!(e(5, -1) < e(0, 0));
    assert!(e(-3, 2) > e(4, 1));
    assert!(e(1, 1) < e(2, 1));
}

#[test]
fn plane_conversion_round_trips() {
    for p in Eisenstein::hexagon(5) {
        let xy = p.to_xy();
        assert_eq!(Eisenstein::from_xy(xy), p);
        assert_eq!(Eisenstein::from_xy(xy + Xy::new(0.2, -0.2)), p);
    }
    assert!((e(0, 1).to_xy().length() - 1.0).abs() < 1e-12);
}

#[test]
fn page_index_is_dense_over_the_page() {
    let mut seen = HashSet::new();
    for p in Eisenstein::hexagon(6) {
        let i = p.page_index();
        assert!(i < 127);
        assert!(seen.insert(i));
        assert_eq!(Eisenstein::nth_in_hexagon(i), p);
    }
    assert_eq!(seen.len(), 127);
    assert_eq!(Eisenstein::nth_in_hexagon(0), e(-6, -6));
    assert_eq!(Eisenstein::nth_in_hexagon(63), Eisenstein::ZERO);
    assert_eq!(Eisenstein::nth_in_hexagon(126), e(6, 6));
}

#[test]
fn page_remainders_stay_in_the_page() {
    for p in Eisenstein::hexagon(40) {
        let (q, r) = p.div_rem(PAGE_MODULUS).unwrap();
        assert!(r.hex_distance() <= 6, "{p:?} left remainder {r:?}");
        assert_eq!(q * PAGE_MODULUS + r, p);
    }
}

#[test]
fn hexagon_enumerates_each_point_once() {
    for r in 0..8 {
        let pts: Vec<_> = Eisenstein::hexagon(r).collect();
        let set: HashSet<_> = pts.iter().copied().collect();
        assert_eq!(pts.len(), (3 * r * (r + 1) + 1) as usize);
        assert_eq!(set.len(), pts.len());
        assert!(pts.iter().all(|p| p.hex_distance() <= r));
    }
}

#[test]
fn hex_array_pages() {
    let mut map: HexArray<u32> = HexArray::new();
    let far = e(1000, -400);
    *map.get_mut(Eisenstein::ZERO) = 7;
    *map.get_mut(e(1, 0)) = 8;
    *map.get_mut(far) = 9;
    assert_eq!(map.get(Eisenstein::ZERO), Some(&7));
    assert_eq!(map.get(e(1, 0)), Some(&8));
    assert_eq!(map.get(far), Some(&9));
    assert_eq!(map.get(e(2, 0)), Some(&0));
    assert_eq!(map.get(e(-3000, 2)), None);
    assert_eq!(map.page_count(), 2);

    let set: Vec<_> = map.iter().filter(|(_, v)| **v != 0).map(|(a, v)| (a, *v)).collect();
    assert_eq!(set.len(), 3);
    assert!(set.contains(&(far, 9)));
}

#[test]
fn first_scales_match_reference_sequence() {
    let one: Vec<_> = (-3..=3).map(|n| flow_address(n, 1)).collect();
    assert_eq!(one, vec![e(-1, -1), e(-1, 0), e(0, 0), e(0, -1), e(1, 0), e(1, 1), e(0, 1)]);
    let two: Vec<_> = (-24..-12).map(|n| flow_address(n, 2)).collect();
    assert_eq!(
        two,
        vec![
            e(-4, -3), e(-4, -2), e(-3, -2), e(-3, -3), e(-2, -2), e(-2, -1),
            e(-3, -1), e(-3, 0), e(-3, 1), e(-2, 2), e(-1, 2), e(-2, 1),
        ]
    );
    assert_eq!(flow_address(0, 5), e(-50, -21));
    assert_eq!(flow_address(1, 5), e(-50, -22));
    assert_eq!(flow_address(-1, 5), e(-49, -21));
}

#[test]
fn traversal_is_complete_and_adjacent() {
    let halves = [0i64, 3, 22, 157, 1168, 8181, 53982];
    for (scale, &half) in halves.iter().enumerate() {
        let scale = scale as u32;
        let radius = Flowsnake::scale_radius(scale);
        let snake = Flowsnake::with_range(scale, -half, half);
        let mut seen = HashSet::new();
        let mut prev: Option<Eisenstein> = None;
        while let Some(a) = snake.next() {
            assert!(seen.insert(a), "scale {scale} repeated {a:?}");
            if let Some(p) = prev {
                assert!(p.is_adjacent(a), "scale {scale}: {p:?} -> {a:?}");
            }
            prev = Some(a);
        }
        assert_eq!(seen.len() as i64, 2 * half + 1);
        assert_eq!(snake.next_or_sentinel(), Eisenstein::SENTINEL);
        for p in Eisenstein::hexagon(radius) {
            assert!(seen.contains(&p), "scale {scale} misses {p:?}");
        }
    }
}

#[test]
fn progress_runs_from_zero_to_one() {
    let snake = Flowsnake::with_range(2, -9, 9);
    assert_eq!(snake.stop() - snake.start(), 18);
    snake.next();
    snake.restart();
    assert_eq!(snake.progress(), 0.0);
    let mut last = 0.0;
    for _ in 0..19 {
        assert!(snake.next().is_some());
        let p = snake.progress();
        assert!(p >= last);
        last = p;
    }
    assert_eq!(snake.progress(), 1.0);
    assert!(snake.next().is_none());
    assert_eq!(snake.progress(), 1.0);
}

#[test]
fn concurrent_callers_split_the_range() {
    let snake = Arc::new(Flowsnake::with_range(4, -1168, 1168));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let snake = Arc::clone(&snake);
            std::thread::spawn(move || {
                let mut got = Vec::new();
                while let Some(a) = snake.next() {
                    got.push(a);
                }
                got
            })
        })
        .collect();
    let mut all = HashSet::new();
    let mut total = 0;
    for h in handles {
        let got = h.join().unwrap();
        total += got.len();
        all.extend(got);
    }
    assert_eq!(total, 2337);
    assert_eq!(all.len(), 2337);
}

#[test]
fn scale_is_chosen_by_log_spacing() {
    let cube = Cube::new(Xyz::new(0.0, 0.0, 0.0), 100.0);
    let snake = Flowsnake::new(&cube, 1.0);
    assert_eq!(snake.scale(), 5);
    assert!((snake.spacing() - 100.0 * 6f64.sqrt() / 187.0).abs() < 1e-9);
    assert_eq!(snake.len(), 16363);

    let radius = Flowsnake::scale_radius(snake.scale());
    let mut x = -49.9;
    while x < 50.0 {
        let mut y = -49.9;
        while y < 50.0 {
            let tile = snake.nearest(Xy::new(x, y));
            assert!(tile.hex_distance() <= radius, "({x}, {y}) falls outside");
            y += 0.7;
        }
        x += 0.7;
    }
}

#[test]
fn tile_cylinder_circumscribes_hexagon() {
    let snake = Flowsnake::with_range(1, -3, 3);
    let cyl = snake.cylinder(e(1, 0));
    assert_eq!(cyl.center(), Xy::new(1.0, 0.0));
    assert!((cyl.radius() - 1.0 / 3f64.sqrt()).abs() < 1e-12);
}

proptest! {
    #[test]
    fn division_identity(ax in -500i32..500, ay in -500i32..500, bx in -60i32..60, by in -60i32..60) {
        let a = e(ax, ay);
        let b = e(bx, by);
        prop_assume!(b != Eisenstein::ZERO);
        let (q, r) = a.div_rem(b).unwrap();
        prop_assert_eq!(q * b + r, a);
        prop_assert!(r.norm() * 3 <= b.norm());
        prop_assert_eq!(a % b, r);
    }
}
