use super::*;
use crate::types::{Xy, Xyz};
use proptest::prelude::*;

#[test]
fn octants_follow_coordinate_signs() {
    let cube = Cube::new(Xyz::new(0.0, 0.0, 0.0), 8.0);
    let p = Xyz::new(1.0, -1.0, 1.0);
    assert_eq!(cube.octant(p), 5);
    let child = cube.octant_cube(5);
    assert_eq!(child.center(), Xyz::new(2.0, -2.0, 2.0));
    assert_eq!(child.side(), 4.0);
    assert!(child.contains_point(p));
    // A coordinate on the center plane goes to the positive side
    assert_eq!(cube.octant(Xyz::new(0.0, 0.0, 0.0)), 7);
}

#[test]
fn face_adjacent_cubes_do_not_overlap() {
    let cube = Cube::new(Xyz::new(0.0, 0.0, 0.0), 8.0);
    let a = cube.octant_cube(0);
    let b = cube.octant_cube(1);
    assert!(!a.overlaps(&b));
    assert!(cube.overlaps(&a));
    assert!(a.overlaps(&cube));
    let far = Cube::new(Xyz::new(20.0, 0.0, 0.0), 8.0);
    assert!(!cube.overlaps(&far));
}

#[test]
fn paraboloid_membership() {
    let p = Paraboloid::downward(Xyz::new(0.0, 0.0, 13.0), 13.0);
    assert!(p.contains(Xyz::new(0.0, 0.0, 13.0)));
    assert!(p.contains(Xyz::new(5.0, 0.0, 12.0)));
    assert!(p.contains(Xyz::new(13.0, 13.0, 0.0)));
    assert!(p.contains(Xyz::new(9.0, 16.0, 0.0)));
    assert!(!p.contains(Xyz::new(5.0, 2.0, 12.0)));
    assert!(!p.contains(Xyz::new(-14.0, -12.0, 0.0)));
}

#[test]
fn upward_paraboloid_misses_cube_below() {
    let p = Paraboloid::upward(Xyz::new(0.0, 0.0, 10.0), 1.0);
    let below = Cube::new(Xyz::new(0.0, 0.0, 0.0), 4.0);
    assert!(!p.intersects(&below));
    let above = Cube::new(Xyz::new(0.0, 0.0, 12.0), 4.0);
    assert!(p.intersects(&above));
}

#[test]
fn hyperboloid_membership() {
    let h = Hyperboloid::new(Xyz::new(0.0, 0.0, 10.0), 2.0, 1.0, Opening::Down);
    assert!(h.contains(Xyz::new(0.0, 0.0, 10.0)));
    assert!(h.contains(Xyz::new(3.0, 0.0, 8.0)));
    assert!(!h.contains(Xyz::new(3.0, 0.0, 8.5)));
    assert!(h.intersects(&Cube::new(Xyz::new(0.0, 0.0, 0.0), 4.0)));
}

#[test]
fn sphere_pruning() {
    let cube = Cube::new(Xyz::new(0.0, 0.0, 0.0), 8.0);
    assert!(!Sphere::new(Xyz::new(10.0, 0.0, 0.0), 5.0).intersects(&cube));
    assert!(Sphere::new(Xyz::new(10.0, 0.0, 0.0), 6.5).intersects(&cube));
    assert!(Sphere::new(Xyz::new(0.0, 0.0, 0.0), 7.0).contains_cube(&cube));
    assert!(!Sphere::new(Xyz::new(0.0, 0.0, 0.0), 6.0).contains_cube(&cube));
}

#[test]
fn cylinder_is_unbounded_in_z() {
    let cyl = Cylinder::new(Xy::new(0.0, 0.0), 10.0);
    assert!(cyl.contains(Xyz::new(3.0, 4.0, 1.0e9)));
    assert!(cyl.contains_cube(&Cube::new(Xyz::new(0.0, 0.0, -500.0), 4.0)));
    assert!(!cyl.intersects(&Cube::new(Xyz::new(20.0, 0.0, 0.0), 4.0)));
}

#[test]
fn column_pixels_are_half_open() {
    let col = Column::pixel(Xy::new(0.0, 0.0), 1.0, 2, 3);
    assert!(col.contains(Xyz::new(2.0, 3.5, -7.0)));
    assert!(!col.contains(Xyz::new(3.0, 3.5, 0.0)));
    assert!(col.intersects(&Cube::new(Xyz::new(3.4, 3.5, 0.0), 1.0)));
    // Touches only the excluded edge
    assert!(!col.intersects(&Cube::new(Xyz::new(3.5, 3.5, 0.0), 1.0)));
    assert!(!col.intersects(&Cube::new(Xyz::new(-0.5, 3.5, 0.0), 1.0)));
}

fn cube_strategy() -> impl Strategy<Value = Cube> {
    (-50.0..50.0f64, -50.0..50.0f64, -50.0..50.0f64, 0.5..40.0f64)
        .prop_map(|(x, y, z, s)| Cube::new(Xyz::new(x, y, z), s))
}

fn interior(cube: &Cube, t: (f64, f64, f64)) -> Xyz {
    let h = cube.side() / 2.0;
    let c = cube.center();
    Xyz::new(c.x + t.0 * h, c.y + t.1 * h, c.z + t.2 * h)
}

proptest! {
    #[test]
    fn pruning_never_rejects_a_cube_with_a_member(
        cube in cube_strategy(),
        t in (-1.0..1.0f64, -1.0..1.0f64, -1.0..1.0f64),
        (cx, cy, cz) in (-60.0..60.0f64, -60.0..60.0f64, -60.0..60.0f64),
        r in 0.5..60.0f64,
        slope in 0.1..5.0f64,
    ) {
        let p = interior(&cube, t);
        let center = Xyz::new(cx, cy, cz);
        let shapes: Vec<Box<dyn Shape>> = vec![
            Box::new(Sphere::new(center, r)),
            Box::new(Cylinder::new(center.xy(), r)),
            Box::new(Paraboloid::downward(center, r)),
            Box::new(Paraboloid::upward(center, r)),
            Box::new(Hyperboloid::new(center, r, slope, Opening::Down)),
            Box::new(Hyperboloid::new(center, r, slope, Opening::Up)),
            Box::new(Column::new(center.xy(), r)),
            Box::new(Cube::new(center, r)),
        ];
        for shape in &shapes {
            if shape.contains(p) {
                prop_assert!(shape.intersects(&cube));
            }
            if shape.contains_cube(&cube) {
                prop_assert!(shape.contains(p));
            }
        }
    }
}
