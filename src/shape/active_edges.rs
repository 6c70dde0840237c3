//! Classification of mesh edges into active and inactive ones.
//!
//! An active edge is one that can legitimately produce a contact normal of
//! its own: a boundary edge, a non-manifold edge, or a sharp convex fold
//! between two faces. Contacts landing on inactive (flat interior) edges are
//! reattributed to the adjacent face by the contact pipeline, which
//! suppresses ghost bumps when bodies slide across coplanar tessellations.

use crate::math::{Point, Real, Vector};
use crate::shape::{IndexedTriangle, FLAGS_ACTIVE_EDGE_SHIFT};
use crate::utils::ccw_face_normal;
use crate::utils::hashmap::HashMap;

/// Convex folds shallower than this (sine of the fold angle) stay inactive.
const ACTIVE_EDGE_SIN_THRESHOLD: Real = 0.087_155_74; // sin(5°)

/// Identifies a mesh edge regardless of the direction it is traversed in.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
struct EdgeKey {
    min: u32,
    max: u32,
}

impl EdgeKey {
    fn new(a: u32, b: u32) -> Self {
        EdgeKey {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

/// Decides whether the edge between two faces is active.
///
/// `normal1` and `normal2` are the (unit) face normals; `edge_direction`
/// points along the edge as ordered in the first face and need not be
/// normalized. The edge is active when the second face folds convexly away
/// from the first one by more than a small threshold angle; coplanar and
/// concave configurations are inactive.
pub fn is_edge_active(
    normal1: &Vector<Real>,
    normal2: &Vector<Real>,
    edge_direction: &Vector<Real>,
) -> bool {
    // Points out of face 1, away from its interior, within its plane.
    let perpendicular = edge_direction.cross(normal1);
    perpendicular.dot(normal2) < -ACTIVE_EDGE_SIN_THRESHOLD * edge_direction.norm()
}

/// Folds the active-edge bits into the flag words of `triangles`.
///
/// Edges with one incident triangle (boundary) or three and more
/// (non-manifold) are always active; edges shared by exactly two triangles
/// are classified by [`is_edge_active`] on the two face planes.
pub fn mark_active_edges(vertices: &[Point<Real>], triangles: &mut [IndexedTriangle]) {
    // Each entry records the incident triangle and the edge's position in it.
    let mut edge_to_triangles: HashMap<EdgeKey, Vec<(u32, u32)>> = HashMap::default();
    for (triangle_idx, triangle) in triangles.iter().enumerate() {
        for edge_idx in 0..3 {
            let key = EdgeKey::new(triangle.idx[edge_idx], triangle.idx[(edge_idx + 1) % 3]);
            edge_to_triangles
                .entry(key)
                .or_default()
                .push((triangle_idx as u32, edge_idx as u32));
        }
    }

    for incident in edge_to_triangles.values() {
        let active = match incident[..] {
            [_] => true,
            [(t1, e1), (t2, _)] => {
                let triangle1 = &triangles[t1 as usize];
                let triangle2 = &triangles[t2 as usize];

                let n1 = triangle_normal(vertices, triangle1);
                let n2 = triangle_normal(vertices, triangle2);
                let edge_from = vertices[triangle1.idx[e1 as usize] as usize];
                let edge_to = vertices[triangle1.idx[(e1 as usize + 1) % 3] as usize];

                match (n1, n2) {
                    (Some(n1), Some(n2)) => is_edge_active(&n1, &n2, &(edge_to - edge_from)),
                    // A zero-area neighbour gives no usable plane.
                    _ => true,
                }
            }
            _ => true,
        };

        if active {
            for (triangle_idx, edge_idx) in incident {
                let triangle = &mut triangles[*triangle_idx as usize];
                let mask = 1 << (edge_idx + FLAGS_ACTIVE_EDGE_SHIFT);
                debug_assert_eq!(triangle.material_index & mask, 0);
                triangle.material_index |= mask;
            }
        }
    }
}

fn triangle_normal(vertices: &[Point<Real>], triangle: &IndexedTriangle) -> Option<Vector<Real>> {
    ccw_face_normal([
        &vertices[triangle.idx[0] as usize],
        &vertices[triangle.idx[1] as usize],
        &vertices[triangle.idx[2] as usize],
    ])
    .map(|n| n.into_inner())
}
