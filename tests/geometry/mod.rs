mod common;

mod cube_scenarios;
mod mesh_collide_convex;
mod mesh_ray_cast;
mod mesh_serialization;
