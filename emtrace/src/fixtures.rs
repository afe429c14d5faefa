//! Shared detector geometries for the unit tests.

use crate::params::{
    BlockElementParams, BlockLayerParams, BlockPlacementParams, BlockRingParams,
    BlockShapeParams, BlockTomoParams, CylLayerParams, CylRingParams, CylindricalParams,
    PlanarLayerParams, PlanarParams, PositionAlgorithm,
};

/// A ring of `n` single-element blocks at radius 40, facing the axis:
/// boxes 2 cm deep, 3 cm wide, 10 cm long, inside a ring bounded by radii
/// 35 and 50 and z in [-5, 5].
pub fn ring_of_blocks(n: usize) -> BlockTomoParams {
    let blocks = (0..n)
        .map(|i| BlockPlacementParams {
            radial_position: 40.0,
            angular_position_deg: 360.0 * (i as f64) / (n as f64),
            z_position: 0.0,
            transaxial_orientation_deg: 0.0,
            shape: BlockShapeParams {
                reference: [0.0, 0.0, 0.0],
                x_bounds: [0.0, 2.0],
                y_bounds: [-1.5, 1.5],
                z_bounds: [-5.0, 5.0],
                layers: vec![BlockLayerParams {
                    inner_x: 0.0,
                    outer_x: 2.0,
                    y_changes: vec![],
                    z_changes: vec![],
                    elements: vec![BlockElementParams {
                        material: 0,
                        is_active: true,
                    }],
                }],
            },
        })
        .collect();

    BlockTomoParams {
        position_algorithm: PositionAlgorithm::default(),
        rings: vec![BlockRingParams {
            x_inner_radius: 35.0,
            y_inner_radius: 35.0,
            x_outer_radius: 50.0,
            y_outer_radius: 50.0,
            min_z: -5.0,
            max_z: 5.0,
            axial_shift: 0.0,
            transaxial_rotation_deg: 0.0,
            blocks,
        }],
    }
}

fn one_block_ring(shape: BlockShapeParams) -> BlockTomoParams {
    BlockTomoParams {
        position_algorithm: PositionAlgorithm::default(),
        rings: vec![BlockRingParams {
            x_inner_radius: 35.0,
            y_inner_radius: 35.0,
            x_outer_radius: 50.0,
            y_outer_radius: 50.0,
            min_z: -5.0,
            max_z: 5.0,
            axial_shift: 0.0,
            transaxial_rotation_deg: 0.0,
            blocks: vec![BlockPlacementParams {
                radial_position: 40.0,
                angular_position_deg: 0.0,
                z_position: 0.0,
                transaxial_orientation_deg: 0.0,
                shape,
            }],
        }],
    }
}

/// A single block at angle 0 with two x-layers, each split 2x2 in y and z:
/// layer 0 uses material 0, layer 1 material 1, all elements active.
pub fn gridded_block() -> BlockTomoParams {
    let layer = |inner_x: f64, outer_x: f64, material: usize| BlockLayerParams {
        inner_x,
        outer_x,
        y_changes: vec![0.0],
        z_changes: vec![0.0],
        elements: vec![
            BlockElementParams {
                material,
                is_active: true,
            };
            4
        ],
    };

    one_block_ring(BlockShapeParams {
        reference: [0.0, 0.0, 0.0],
        x_bounds: [0.0, 2.0],
        y_bounds: [-1.0, 1.0],
        z_bounds: [-1.0, 1.0],
        layers: vec![layer(0.0, 1.0, 0), layer(1.0, 2.0, 1)],
    })
}

/// A single block at angle 0 with one layer split into a 2x2 grid where
/// only the diagonal elements are active.
pub fn diagonal_block() -> BlockTomoParams {
    let elements = vec![
        BlockElementParams {
            material: 0,
            is_active: true,
        },
        BlockElementParams {
            material: 0,
            is_active: false,
        },
        BlockElementParams {
            material: 0,
            is_active: false,
        },
        BlockElementParams {
            material: 0,
            is_active: true,
        },
    ];

    one_block_ring(BlockShapeParams {
        reference: [0.0, 0.0, 0.0],
        x_bounds: [0.0, 2.0],
        y_bounds: [-1.0, 1.0],
        z_bounds: [-1.0, 1.0],
        layers: vec![BlockLayerParams {
            inner_x: 0.0,
            outer_x: 2.0,
            y_changes: vec![0.0],
            z_changes: vec![0.0],
            elements,
        }],
    })
}

/// A single-ring cylindrical detector with one absorbing layer from radius
/// 40 to 43.
pub fn one_layer_cylinder() -> CylindricalParams {
    CylindricalParams {
        rings: vec![CylRingParams {
            min_z: -10.0,
            max_z: 10.0,
            gap_material: None,
            layers: vec![CylLayerParams {
                material: 0,
                inner_radius: 40.0,
                outer_radius: 43.0,
                is_active: true,
            }],
        }],
    }
}

/// A single-ring cylindrical detector with two layers: material 0 from 40
/// to 42 and material 1 from 42 to 45.
pub fn two_layer_cylinder() -> CylindricalParams {
    CylindricalParams {
        rings: vec![CylRingParams {
            min_z: -10.0,
            max_z: 10.0,
            gap_material: None,
            layers: vec![
                CylLayerParams {
                    material: 0,
                    inner_radius: 40.0,
                    outer_radius: 42.0,
                    is_active: true,
                },
                CylLayerParams {
                    material: 1,
                    inner_radius: 42.0,
                    outer_radius: 45.0,
                    is_active: true,
                },
            ],
        }],
    }
}

/// A one-layer CsI planar head: 1 cm deep, 30 cm inner radius, 40 cm axial
/// and 50 cm transaxial extent, 64 views over the full circle.
pub fn csi_planar() -> PlanarParams {
    PlanarParams {
        layers: vec![PlanarLayerParams {
            material: 0,
            depth: 1.0,
            is_active: true,
        }],
        inner_radius: 30.0,
        axial_length: 40.0,
        transaxial_length: 50.0,
        num_views: 64,
        min_angle_deg: 0.0,
        max_angle_deg: 360.0,
    }
}
